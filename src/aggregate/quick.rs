//! Quick mode: GitHub's precomputed contributor statistics.
//!
//! `GET /repos/{owner}/{repo}/stats/contributors` answers `202 Accepted`
//! while GitHub computes the numbers in the background. The aggregator
//! polls a bounded number of times and degrades the repository when the
//! data never arrives.
//!
//! Weekly buckets are counted whole whenever the week overlaps the window.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::poll::{poll_with_deadline, PollState};
use super::{AggregateOptions, Aggregator, RepoOutcome};
use crate::error::{FetchError, Result};
use crate::github::types::{login_of, ContributorStats};
use crate::github::ApiClient;
use crate::models::{Contribution, Metric, Mode, RepoId, Repository, TimeWindow};

pub struct QuickAggregator {
    client: Arc<ApiClient>,
    options: AggregateOptions,
}

impl QuickAggregator {
    pub fn new(client: Arc<ApiClient>, options: AggregateOptions) -> Self {
        Self { client, options }
    }

    /// One request to the statistics endpoint.
    async fn probe(&self, path: &str) -> Result<PollState<Vec<ContributorStats>>> {
        let response = self.client.request(path, &[]).await?;
        match response.status {
            202 => Ok(PollState::NotReady),
            // Empty repositories answer 204 with no body.
            204 => Ok(PollState::Ready(Vec::new())),
            _ if response.body.is_null() => Ok(PollState::Ready(Vec::new())),
            _ => serde_json::from_value(response.body)
                .map(PollState::Ready)
                .map_err(|e| FetchError::Decode {
                    url: path.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Contributor statistics, polled until ready.
    pub async fn fetch_stats(&self, repo: &Repository) -> Result<PollState<Vec<ContributorStats>>> {
        let path = format!(
            "/repos/{}/{}/stats/contributors",
            repo.id.org, repo.id.name
        );
        poll_with_deadline(&self.options.poll, self.client.cancellation(), || {
            self.probe(&path)
        })
        .await
    }
}

/// Turn statistics into contributions inside `window`.
///
/// Every overlapping week yields one contribution per non-zero metric,
/// keyed by the entry's position and the week start.
pub fn stats_contributions(
    repo: &RepoId,
    window: &TimeWindow,
    stats: &[ContributorStats],
) -> Vec<Contribution> {
    let mut out = Vec::new();
    for (index, entry) in stats.iter().enumerate() {
        let login = login_of(&entry.author);
        for week in &entry.weeks {
            let Some(start) = week.start() else {
                continue;
            };
            if !window.overlaps_week(start) {
                continue;
            }
            for (metric, value) in [
                (Metric::Commits, week.c),
                (Metric::LinesAdded, week.a),
                (Metric::LinesRemoved, week.d),
            ] {
                if value == 0 {
                    continue;
                }
                out.push(Contribution {
                    repo: repo.clone(),
                    contributor: login.clone(),
                    metric,
                    value,
                    source: format!("stats:{}:{}", index, week.w),
                });
            }
        }
    }
    out
}

#[async_trait]
impl Aggregator for QuickAggregator {
    fn mode(&self) -> Mode {
        Mode::Quick
    }

    async fn collect(&self, repo: &Repository) -> Result<RepoOutcome> {
        match self.fetch_stats(repo).await? {
            PollState::Ready(stats) => {
                let contributions = stats_contributions(&repo.id, &self.options.window, &stats);
                debug!(
                    "{}: {} contributors in statistics, {} contributions in window",
                    repo.id,
                    stats.len(),
                    contributions.len()
                );
                Ok(RepoOutcome::Collected(contributions))
            }
            PollState::GaveUp { attempts } => Ok(degrade(repo, attempts)),
            PollState::NotReady => Ok(degrade(repo, self.options.poll.max_attempts)),
        }
    }
}

fn degrade(repo: &Repository, attempts: usize) -> RepoOutcome {
    let reason = FetchError::StatsNotReady { attempts }.short_reason();
    warn!("{}: {}; recording zero contributions", repo.id, reason);
    RepoOutcome::Degraded { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::testing::{january_2024, options, repo, ts};
    use crate::github::client::testing::{test_client, API};
    use crate::github::transport::mock::MockTransport;
    use serde_json::{json, Value};

    fn stats_url(org: &str, name: &str) -> String {
        format!("{}/repos/{}/{}/stats/contributors", API, org, name)
    }

    fn week(start: &str, a: u64, d: u64, c: u64) -> Value {
        json!({"w": ts(start).timestamp(), "a": a, "d": d, "c": c})
    }

    fn aggregator(transport: &MockTransport) -> QuickAggregator {
        QuickAggregator::new(Arc::new(test_client(transport)), options())
    }

    fn total(contributions: &[Contribution], login: &str, metric: Metric) -> u64 {
        contributions
            .iter()
            .filter(|c| c.contributor == login && c.metric == metric)
            .map(|c| c.value)
            .sum()
    }

    #[test]
    fn test_whole_week_overlap_rule() {
        let stats: Vec<ContributorStats> = serde_json::from_value(json!([{
            "author": {"login": "alice"},
            "total": 10,
            "weeks": [
                // ends 2023-12-24, before the window
                week("2023-12-17T00:00:00Z", 100, 0, 1),
                // straddles `since`
                week("2023-12-31T00:00:00Z", 10, 1, 2),
                week("2024-01-14T00:00:00Z", 20, 2, 3),
                // straddles `until`
                week("2024-01-28T00:00:00Z", 30, 3, 4),
                // starts at `until`
                week("2024-02-01T00:00:00Z", 1000, 0, 9),
            ]
        }]))
        .unwrap();

        let out = stats_contributions(&RepoId::new("acme", "core"), &january_2024(), &stats);
        assert_eq!(total(&out, "alice", Metric::LinesAdded), 60);
        assert_eq!(total(&out, "alice", Metric::LinesRemoved), 6);
        assert_eq!(total(&out, "alice", Metric::Commits), 9);
    }

    #[test]
    fn test_null_authors_are_kept_apart() {
        let stats: Vec<ContributorStats> = serde_json::from_value(json!([
            {"author": null, "weeks": [week("2024-01-07T00:00:00Z", 5, 0, 1)]},
            {"author": null, "weeks": [week("2024-01-07T00:00:00Z", 7, 0, 1)]},
        ]))
        .unwrap();

        let out = stats_contributions(&RepoId::new("acme", "core"), &january_2024(), &stats);
        let sources: std::collections::HashSet<_> = out.iter().map(|c| &c.source).collect();
        assert_eq!(total(&out, "Unknown", Metric::LinesAdded), 12);
        assert_eq!(sources.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_through_accepted_responses() {
        let transport = MockTransport::new();
        let url = stats_url("acme", "core");
        transport.push_json(&url, 202, json!({}));
        transport.push_json(&url, 202, json!({}));
        transport.push_json(
            &url,
            200,
            json!([
                {"author": {"login": "alice"}, "weeks": [week("2024-01-07T00:00:00Z", 40, 4, 2)]},
                {"author": {"login": "bob"}, "weeks": [week("2024-01-14T00:00:00Z", 2, 0, 1)]},
            ]),
        );

        let outcome = aggregator(&transport)
            .collect(&repo("acme", "core"))
            .await
            .unwrap();

        let RepoOutcome::Collected(contributions) = outcome else {
            panic!("expected collected outcome");
        };
        // lines added across contributors equals the endpoint's total
        let added: u64 = contributions
            .iter()
            .filter(|c| c.metric == Metric::LinesAdded)
            .map(|c| c.value)
            .sum();
        assert_eq!(added, 42);
        assert_eq!(transport.request_count(&url), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_computing_after_all_polls_degrades() {
        let transport = MockTransport::new();
        let url = stats_url("acme", "huge");
        transport.always_json(&url, 202, json!({}));

        let outcome = aggregator(&transport)
            .collect(&repo("acme", "huge"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RepoOutcome::Degraded {
                reason: "contributor statistics still being computed after 5 attempts".to_string(),
            }
        );
        assert_eq!(transport.request_count(&url), 5);
    }

    #[tokio::test]
    async fn test_empty_repository_has_no_contributions() {
        let transport = MockTransport::new();
        let url = stats_url("acme", "empty");
        transport.push_json(&url, 204, Value::Null);

        let outcome = aggregator(&transport)
            .collect(&repo("acme", "empty"))
            .await
            .unwrap();

        assert_eq!(outcome, RepoOutcome::Collected(Vec::new()));
    }

    #[tokio::test]
    async fn test_missing_repository_is_an_error() {
        let transport = MockTransport::new();
        let url = stats_url("acme", "gone");
        transport.push_json(&url, 404, json!({"message": "Not Found"}));

        let err = aggregator(&transport)
            .collect(&repo("acme", "gone"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Request { status: 404, .. }));
        assert!(!err.is_run_fatal());
    }
}
