//! Slow mode: pull requests, reviews and comments.
//!
//! Starts from the quick-mode statistics and adds per-event metrics by
//! walking every pull request updated since shortly before the window.
//! Pull requests are listed newest-update first, so the walk stops at the
//! first one older than the widened window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use futures::{future, TryStreamExt};
use tracing::{debug, warn};

use super::quick::QuickAggregator;
use super::{AggregateOptions, Aggregator, RepoOutcome};
use crate::error::Result;
use crate::github::types::{login_of, Comment, PullRequest, Review};
use crate::github::ApiClient;
use crate::models::{Contribution, Metric, Mode, RepoId, Repository, TimeWindow};

pub struct SlowAggregator {
    client: Arc<ApiClient>,
    options: AggregateOptions,
    stats: QuickAggregator,
}

impl SlowAggregator {
    pub fn new(client: Arc<ApiClient>, options: AggregateOptions) -> Self {
        let stats = QuickAggregator::new(client.clone(), options.clone());
        Self {
            client,
            options,
            stats,
        }
    }

    /// Pull requests that may carry activity inside the window.
    async fn pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequest>> {
        let horizon = self.options.window.widened(self.options.pr_window_slack).since;
        let path = format!("/repos/{}/{}/pulls", repo.org, repo.name);
        let params = [
            ("state", "all".to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        self.client
            .paginate_as::<PullRequest>(&path, &params)
            .try_take_while(|pr| future::ready(Ok(pr.updated_at >= horizon)))
            .try_collect()
            .await
    }

    async fn pr_contributions(&self, repo: &RepoId, pr: &PullRequest) -> Result<Vec<Contribution>> {
        let window = &self.options.window;
        let mut out = Vec::new();

        if window.contains(pr.created_at) {
            out.push(event(repo, login_of(&pr.user), Metric::PrsOpened, format!("pr:{}", pr.id)));
        }

        // Every review or comment bumps `updated_at`, so nothing newer than
        // `since` can hide behind an older timestamp.
        if pr.updated_at < window.since || pr.created_at >= window.until {
            return Ok(out);
        }

        let since = [(
            "since",
            window.since.to_rfc3339_opts(SecondsFormat::Secs, true),
        )];
        let reviews_path = format!("/repos/{}/{}/pulls/{}/reviews", repo.org, repo.name, pr.number);
        let review_comments_path =
            format!("/repos/{}/{}/pulls/{}/comments", repo.org, repo.name, pr.number);
        let issue_comments_path =
            format!("/repos/{}/{}/issues/{}/comments", repo.org, repo.name, pr.number);

        let (reviews, review_comments, issue_comments) = futures::try_join!(
            self.client.paginate_as::<Review>(&reviews_path, &[]).try_collect::<Vec<_>>(),
            self.client
                .paginate_as::<Comment>(&review_comments_path, &since)
                .try_collect::<Vec<_>>(),
            self.client
                .paginate_as::<Comment>(&issue_comments_path, &since)
                .try_collect::<Vec<_>>(),
        )?;

        out.extend(review_contributions(repo, window, pr, &reviews));
        out.extend(comment_contributions(repo, window, "review-comment", &review_comments));
        out.extend(comment_contributions(repo, window, "issue-comment", &issue_comments));
        Ok(out)
    }
}

fn event(repo: &RepoId, contributor: String, metric: Metric, source: String) -> Contribution {
    Contribution {
        repo: repo.clone(),
        contributor,
        metric,
        value: 1,
        source,
    }
}

/// One `prs_reviewed` per reviewer and pull request, however many reviews
/// they submitted on it.
fn review_contributions(
    repo: &RepoId,
    window: &TimeWindow,
    pr: &PullRequest,
    reviews: &[Review],
) -> Vec<Contribution> {
    reviews
        .iter()
        .filter(|r| r.submitted_at.is_some_and(|at| window.contains(at)))
        .map(|r| {
            let login = login_of(&r.user);
            let source = format!("review:{}:{}", pr.id, login);
            event(repo, login, Metric::PrsReviewed, source)
        })
        .collect()
}

fn comment_contributions(
    repo: &RepoId,
    window: &TimeWindow,
    kind: &str,
    comments: &[Comment],
) -> Vec<Contribution> {
    comments
        .iter()
        .filter(|c| window.contains(c.created_at))
        .map(|c| {
            event(
                repo,
                login_of(&c.user),
                Metric::Comments,
                format!("{}:{}", kind, c.id),
            )
        })
        .collect()
}

#[async_trait]
impl Aggregator for SlowAggregator {
    fn mode(&self) -> Mode {
        Mode::Slow
    }

    async fn collect(&self, repo: &Repository) -> Result<RepoOutcome> {
        let (mut contributions, stats_gap) = match self.stats.collect(repo).await? {
            RepoOutcome::Collected(c) => (c, None),
            RepoOutcome::Partial {
                contributions,
                reason,
            } => (contributions, Some(reason)),
            RepoOutcome::Degraded { reason } => {
                warn!("{}: no commit statistics; counting pull requests only", repo.id);
                (Vec::new(), Some(reason))
            }
        };

        let prs = self.pull_requests(&repo.id).await?;
        debug!("{}: walking {} pull requests", repo.id, prs.len());
        for pr in &prs {
            contributions.extend(self.pr_contributions(&repo.id, pr).await?);
        }

        Ok(match stats_gap {
            None => RepoOutcome::Collected(contributions),
            Some(reason) => RepoOutcome::Partial {
                contributions,
                reason,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::testing::{options, repo};
    use crate::github::client::testing::{test_client, API};
    use crate::github::transport::mock::MockTransport;
    use serde_json::json;

    const SINCE: &str = "since=2024-01-01T00%3A00%3A00Z";

    fn aggregator(transport: &MockTransport) -> SlowAggregator {
        SlowAggregator::new(Arc::new(test_client(transport)), options())
    }

    fn count(contributions: &[Contribution], login: &str, metric: Metric) -> u64 {
        contributions
            .iter()
            .filter(|c| c.contributor == login && c.metric == metric)
            .map(|c| c.value)
            .sum()
    }

    fn pulls_url() -> String {
        format!(
            "{}/repos/acme/core/pulls?state=all&sort=updated&direction=desc&per_page=100",
            API
        )
    }

    fn serve_pr_children(
        transport: &MockTransport,
        number: u64,
        reviews: serde_json::Value,
        review_comments: serde_json::Value,
        issue_comments: serde_json::Value,
    ) {
        transport.push_json(
            &format!("{}/repos/acme/core/pulls/{}/reviews?per_page=100", API, number),
            200,
            reviews,
        );
        transport.push_json(
            &format!("{}/repos/acme/core/pulls/{}/comments?{}&per_page=100", API, number, SINCE),
            200,
            review_comments,
        );
        transport.push_json(
            &format!("{}/repos/acme/core/issues/{}/comments?{}&per_page=100", API, number, SINCE),
            200,
            issue_comments,
        );
    }

    #[tokio::test]
    async fn test_slow_mode_collects_events_in_window() {
        let transport = MockTransport::new();
        transport.push_json(
            &format!("{}/repos/acme/core/stats/contributors", API),
            200,
            json!([{"author": {"login": "alice"}, "weeks": [{"w": 1704585600, "a": 10, "d": 1, "c": 2}]}]),
        );
        transport.push_json(
            &pulls_url(),
            200,
            json!([
                {"id": 101, "number": 7, "user": {"login": "alice"},
                 "created_at": "2024-01-10T00:00:00Z", "updated_at": "2024-01-20T00:00:00Z"},
                // opened before the window, reviewed inside it
                {"id": 102, "number": 3, "user": {"login": "carol"},
                 "created_at": "2023-12-20T00:00:00Z", "updated_at": "2024-01-05T00:00:00Z"},
                // inside the slack only: listed, nothing counted
                {"id": 103, "number": 2, "user": {"login": "dave"},
                 "created_at": "2023-12-01T00:00:00Z", "updated_at": "2023-12-28T00:00:00Z"},
                // older than the slack: stops the walk
                {"id": 104, "number": 1, "user": {"login": "erin"},
                 "created_at": "2023-11-01T00:00:00Z", "updated_at": "2023-11-02T00:00:00Z"},
            ]),
        );
        serve_pr_children(
            &transport,
            7,
            json!([
                {"id": 1, "user": {"login": "bob"}, "submitted_at": "2024-01-11T00:00:00Z", "state": "COMMENTED"},
                {"id": 2, "user": {"login": "bob"}, "submitted_at": "2024-01-12T00:00:00Z", "state": "APPROVED"},
                {"id": 3, "user": {"login": "carol"}, "state": "PENDING"},
            ]),
            json!([{"id": 11, "user": {"login": "bob"}, "created_at": "2024-01-11T00:00:00Z"}]),
            json!([
                {"id": 21, "user": null, "created_at": "2024-01-13T00:00:00Z"},
                {"id": 22, "user": {"login": "alice"}, "created_at": "2024-02-02T00:00:00Z"},
            ]),
        );
        serve_pr_children(
            &transport,
            3,
            json!([{"id": 4, "user": {"login": "alice"}, "submitted_at": "2024-01-04T00:00:00Z", "state": "APPROVED"}]),
            json!([]),
            json!([{"id": 31, "user": {"login": "carol"}, "created_at": "2023-12-21T00:00:00Z"}]),
        );

        let outcome = aggregator(&transport).collect(&repo("acme", "core")).await.unwrap();
        let RepoOutcome::Collected(c) = outcome else {
            panic!("expected collected outcome");
        };

        assert_eq!(count(&c, "alice", Metric::Commits), 2);
        assert_eq!(count(&c, "alice", Metric::PrsOpened), 1);
        assert_eq!(count(&c, "carol", Metric::PrsOpened), 0);
        assert_eq!(count(&c, "dave", Metric::PrsOpened), 0);
        assert_eq!(count(&c, "alice", Metric::PrsReviewed), 1);
        // two reviews on one pull request; merged by source later
        let bob_reviews: Vec<_> = c
            .iter()
            .filter(|x| x.contributor == "bob" && x.metric == Metric::PrsReviewed)
            .map(|x| x.source.as_str())
            .collect();
        assert_eq!(bob_reviews, vec!["review:101:bob", "review:101:bob"]);
        assert_eq!(count(&c, "bob", Metric::Comments), 1);
        assert_eq!(count(&c, "Unknown", Metric::Comments), 1);
        assert_eq!(count(&c, "alice", Metric::Comments), 0);
        assert_eq!(count(&c, "carol", Metric::Comments), 0);

        assert_eq!(
            transport.request_count(&format!("{}/repos/acme/core/pulls/2/reviews?per_page=100", API)),
            0
        );
        assert_eq!(
            transport.request_count(&format!("{}/repos/acme/core/pulls/1/reviews?per_page=100", API)),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_requests_still_count_when_statistics_never_arrive() {
        let transport = MockTransport::new();
        transport.always_json(
            &format!("{}/repos/acme/core/stats/contributors", API),
            202,
            json!({}),
        );
        transport.push_json(
            &pulls_url(),
            200,
            json!([
                {"id": 101, "number": 7, "user": {"login": "alice"},
                 "created_at": "2024-01-10T00:00:00Z", "updated_at": "2024-01-20T00:00:00Z"},
            ]),
        );
        serve_pr_children(
            &transport,
            7,
            json!([{"user": {"login": "bob"}, "submitted_at": "2024-01-11T00:00:00Z"}]),
            json!([]),
            json!([]),
        );

        let outcome = aggregator(&transport).collect(&repo("acme", "core")).await.unwrap();

        assert_eq!(
            outcome.reason(),
            Some("contributor statistics still being computed after 5 attempts")
        );
        let RepoOutcome::Partial { contributions: c, .. } = outcome else {
            panic!("expected partial outcome");
        };
        assert_eq!(count(&c, "alice", Metric::PrsOpened), 1);
        assert_eq!(count(&c, "bob", Metric::PrsReviewed), 1);
        assert_eq!(count(&c, "alice", Metric::Commits), 0);
        assert_eq!(transport.request_count(&pulls_url()), 1);
    }
}
