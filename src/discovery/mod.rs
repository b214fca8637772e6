//! Repository discovery.
//!
//! Lists every repository an organization exposes to the token, drops
//! excluded and archived ones, and keeps the most recently pushed N.

use std::collections::BTreeSet;

use futures::TryStreamExt;
use tracing::{debug, info};

use crate::error::Result;
use crate::github::types::RepoPayload;
use crate::github::ApiClient;
use crate::models::Repository;

/// Selection rules applied to an organization's repositories.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    /// Repository names or `org/name` entries, matched exactly.
    pub exclude: Vec<String>,
    pub top_n: Option<usize>,
    pub include_archived: bool,
}

impl DiscoveryFilter {
    /// Whether `repo` is named in the exclusion list.
    pub fn is_excluded(&self, repo: &Repository) -> bool {
        let full = repo.id.full_name();
        self.exclude
            .iter()
            .any(|entry| *entry == repo.id.name || *entry == full)
    }

    /// Filter and rank an organization's repositories.
    ///
    /// Ranking is by `pushed_at`, most recent first; repositories that were
    /// never pushed sort last. Ties are broken by name so the order is stable.
    pub fn select(&self, repos: Vec<Repository>) -> Vec<Repository> {
        let mut kept: Vec<Repository> = repos
            .into_iter()
            .filter(|r| {
                if self.is_excluded(r) {
                    debug!("Excluding {}", r.id);
                    return false;
                }
                if r.archived && !self.include_archived {
                    debug!("Skipping archived {}", r.id);
                    return false;
                }
                true
            })
            .collect();

        kept.sort_by(|a, b| {
            b.pushed_at
                .cmp(&a.pushed_at)
                .then_with(|| a.id.name.cmp(&b.id.name))
        });

        if let Some(n) = self.top_n {
            kept.truncate(n);
        }
        kept
    }
}

/// List and select the repositories of one organization.
///
/// Any error is returned to the caller; discovery never yields partial
/// organization data.
pub async fn discover(
    client: &ApiClient,
    org: &str,
    filter: &DiscoveryFilter,
) -> Result<Vec<Repository>> {
    let path = format!("/orgs/{}/repos", org);
    let payloads: Vec<RepoPayload> = client
        .paginate_as::<RepoPayload>(&path, &[("type", "all".to_string())])
        .try_collect()
        .await?;

    let total = payloads.len();
    // Pages shift when repositories are created mid-listing; keep the first copy.
    let mut seen = BTreeSet::new();
    let repos: Vec<Repository> = payloads
        .into_iter()
        .map(|p| p.into_repository(org))
        .filter(|r| {
            let fresh = seen.insert(r.id.clone());
            if !fresh {
                debug!("Dropping repeated listing of {}", r.id);
            }
            fresh
        })
        .collect();
    let selected = filter.select(repos);

    info!(
        "Discovered {} repositories in {} ({} selected)",
        total,
        org,
        selected.len()
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::github::client::testing::{test_client, API};
    use crate::github::transport::mock::MockTransport;
    use serde_json::{json, Value};

    fn repo_json(name: &str, pushed_at: &str, archived: bool) -> Value {
        json!({
            "name": name,
            "full_name": format!("acme/{}", name),
            "archived": archived,
            "pushed_at": pushed_at
        })
    }

    fn listing_url(org: &str) -> String {
        format!("{}/orgs/{}/repos?type=all&per_page=100", API, org)
    }

    fn names(repos: &[Repository]) -> Vec<&str> {
        repos.iter().map(|r| r.id.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_exclusion_is_exact_and_case_sensitive() {
        let transport = MockTransport::new();
        transport.push_json(
            &listing_url("acme"),
            200,
            json!([
                repo_json("core", "2024-01-20T00:00:00Z", false),
                repo_json("spam", "2024-01-25T00:00:00Z", false),
                repo_json("spam-filter", "2024-01-10T00:00:00Z", false),
                repo_json("Spam", "2024-01-05T00:00:00Z", false),
            ]),
        );
        let client = test_client(&transport);
        let filter = DiscoveryFilter {
            exclude: vec!["spam".to_string()],
            ..Default::default()
        };

        let repos = discover(&client, "acme", &filter).await.unwrap();
        assert_eq!(names(&repos), vec!["core", "spam-filter", "Spam"]);
    }

    #[tokio::test]
    async fn test_org_qualified_exclusion_only_hits_that_org() {
        let filter = DiscoveryFilter {
            exclude: vec!["globex/core".to_string()],
            ..Default::default()
        };
        let acme: RepoPayload = serde_json::from_value(json!({"name": "core"})).unwrap();
        let globex: RepoPayload = serde_json::from_value(json!({"name": "core"})).unwrap();

        assert!(!filter.is_excluded(&acme.into_repository("acme")));
        assert!(filter.is_excluded(&globex.into_repository("globex")));
    }

    #[tokio::test]
    async fn test_top_n_by_push_recency() {
        let transport = MockTransport::new();
        transport.push_json(
            &listing_url("acme"),
            200,
            json!([
                repo_json("old", "2023-06-01T00:00:00Z", false),
                repo_json("fresh", "2024-01-30T00:00:00Z", false),
                repo_json("mid", "2023-12-01T00:00:00Z", false),
                {"name": "never-pushed"},
            ]),
        );
        let client = test_client(&transport);
        let filter = DiscoveryFilter {
            top_n: Some(2),
            ..Default::default()
        };

        let repos = discover(&client, "acme", &filter).await.unwrap();
        assert_eq!(names(&repos), vec!["fresh", "mid"]);
    }

    #[tokio::test]
    async fn test_repository_repeated_across_pages_is_kept_once() {
        let transport = MockTransport::new();
        let page2 = format!("{}&page=2", listing_url("acme"));
        let link = format!("<{}>; rel=\"next\"", page2);
        transport.push_with_headers(
            &listing_url("acme"),
            200,
            vec![("Link", link.as_str())],
            json!([
                repo_json("core", "2024-01-20T00:00:00Z", false),
                repo_json("web", "2024-01-15T00:00:00Z", false),
            ]),
        );
        transport.push_json(
            &page2,
            200,
            json!([
                repo_json("web", "2024-01-15T00:00:00Z", false),
                repo_json("api", "2024-01-10T00:00:00Z", false),
            ]),
        );
        let client = test_client(&transport);
        let filter = DiscoveryFilter {
            top_n: Some(3),
            ..Default::default()
        };

        let repos = discover(&client, "acme", &filter).await.unwrap();
        assert_eq!(names(&repos), vec!["core", "web", "api"]);
    }

    #[tokio::test]
    async fn test_archived_skipped_unless_requested() {
        let listing = json!([
            repo_json("core", "2024-01-20T00:00:00Z", false),
            repo_json("museum", "2024-01-21T00:00:00Z", true),
        ]);

        let transport = MockTransport::new();
        transport.push_json(&listing_url("acme"), 200, listing.clone());
        let client = test_client(&transport);
        let repos = discover(&client, "acme", &DiscoveryFilter::default())
            .await
            .unwrap();
        assert_eq!(names(&repos), vec!["core"]);

        let transport = MockTransport::new();
        transport.push_json(&listing_url("acme"), 200, listing);
        let client = test_client(&transport);
        let filter = DiscoveryFilter {
            include_archived: true,
            ..Default::default()
        };
        let repos = discover(&client, "acme", &filter).await.unwrap();
        assert_eq!(names(&repos), vec!["museum", "core"]);
    }

    #[tokio::test]
    async fn test_same_name_in_two_orgs_stays_distinct() {
        let transport = MockTransport::new();
        transport.push_json(&listing_url("acme"), 200, json!([{"name": "core"}]));
        transport.push_json(&listing_url("globex"), 200, json!([{"name": "core"}]));
        let client = test_client(&transport);
        let filter = DiscoveryFilter::default();

        let a = discover(&client, "acme", &filter).await.unwrap();
        let b = discover(&client, "globex", &filter).await.unwrap();
        assert_ne!(a[0].id, b[0].id);
        assert_eq!(b[0].full_name, "globex/core");
    }

    #[tokio::test]
    async fn test_unauthorized_listing_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            &listing_url("acme"),
            401,
            json!({"message": "Bad credentials"}),
        );
        let client = test_client(&transport);

        let err = discover(&client, "acme", &DiscoveryFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { status: 401, .. }));
        assert!(err.is_run_fatal());
    }
}
