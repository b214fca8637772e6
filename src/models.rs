//! Data models for the contributor pipeline.
//!
//! This module contains the core data structures shared by discovery,
//! aggregation, merging and the dataset store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Login used for contributions whose GitHub account is gone.
pub const UNKNOWN_CONTRIBUTOR: &str = "Unknown";

/// Data acquisition strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Precomputed contributor statistics only
    #[default]
    Quick,
    /// Walk pull requests, reviews and comments as well
    Slow,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Quick => write!(f, "quick"),
            Mode::Slow => write!(f, "slow"),
        }
    }
}

/// A contribution metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Commits,
    LinesAdded,
    LinesRemoved,
    PrsOpened,
    PrsReviewed,
    Comments,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Commits,
        Metric::LinesAdded,
        Metric::LinesRemoved,
        Metric::PrsOpened,
        Metric::PrsReviewed,
        Metric::Comments,
    ];

    /// Metrics produced from the statistics endpoint.
    pub const QUICK: [Metric; 3] = [Metric::Commits, Metric::LinesAdded, Metric::LinesRemoved];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Commits => "Commits",
            Metric::LinesAdded => "Lines Added",
            Metric::LinesRemoved => "Lines Removed",
            Metric::PrsOpened => "PRs Opened",
            Metric::PrsReviewed => "PRs Reviewed",
            Metric::Comments => "Comments",
        }
    }
}

/// Identifies a repository across organizations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub org: String,
    pub name: String,
}

impl RepoId {
    pub fn new(org: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.org, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

/// A repository found during discovery, with the metadata used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub full_name: String,
    pub html_url: String,
    pub private: bool,
    pub archived: bool,
    pub fork: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub size: u64,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub open_issues_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Half-open query window `[since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    /// Whether an event timestamp falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.since && at < self.until
    }

    /// Whether the week starting at `week_start` overlaps the window.
    ///
    /// Weekly statistics buckets are included whole when any part of the
    /// week intersects `[since, until)`.
    pub fn overlaps_week(&self, week_start: DateTime<Utc>) -> bool {
        let week_end = week_start + Duration::days(7);
        week_start < self.until && week_end > self.since
    }

    /// Widen the window on the lower side.
    pub fn widened(&self, slack: Duration) -> Self {
        Self {
            since: self.since - slack,
            until: self.until,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.since.to_rfc3339(),
            self.until.to_rfc3339()
        )
    }
}

/// One raw observation produced by an aggregator.
///
/// `source` names the upstream event (a statistics week, a pull request,
/// a review, a comment) so that the same event seen twice is only counted
/// once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contribution {
    pub repo: RepoId,
    pub contributor: String,
    pub metric: Metric,
    pub value: u64,
    pub source: String,
}

/// The atomic unit of the dataset: one metric for one contributor in one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub org: String,
    pub repo: String,
    pub contributor: String,
    pub metric: Metric,
    pub value: u64,
}

/// How a repository's aggregation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RepoStatus {
    Complete,
    /// Records are present but one source was missing.
    Partial { reason: String },
    /// Recorded with zero contributions.
    Degraded { reason: String },
}

impl RepoStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, RepoStatus::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RepoStatus::Complete => None,
            RepoStatus::Partial { reason } | RepoStatus::Degraded { reason } => Some(reason),
        }
    }

    /// Degraded beats partial beats complete.
    fn severity(&self) -> u8 {
        match self {
            RepoStatus::Complete => 0,
            RepoStatus::Partial { .. } => 1,
            RepoStatus::Degraded { .. } => 2,
        }
    }

    /// Keep whichever of the two statuses is worse.
    pub fn worst(self, other: RepoStatus) -> RepoStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Per-repository entry in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub org: String,
    pub name: String,
    #[serde(flatten)]
    pub status: RepoStatus,
}

impl RepositoryEntry {
    pub fn id(&self) -> RepoId {
        RepoId::new(&self.org, &self.name)
    }
}

/// The complete output of one fetch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub orgs: Vec<String>,
    pub window: TimeWindow,
    pub mode: Mode,
    pub repositories: Vec<RepositoryEntry>,
    pub records: Vec<ContributionRecord>,
}

impl Dataset {
    /// Sum of one metric over all contributors of a repository.
    #[cfg(test)]
    pub fn repo_total(&self, repo: &RepoId, metric: Metric) -> u64 {
        self.records
            .iter()
            .filter(|r| r.metric == metric && r.org == repo.org && r.repo == repo.name)
            .map(|r| r.value)
            .sum()
    }

    /// Repositories that did not aggregate completely, degraded or partial.
    pub fn incomplete(&self) -> impl Iterator<Item = &RepositoryEntry> {
        self.repositories.iter().filter(|r| r.status.reason().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_window_is_half_open() {
        let w = window();
        assert!(w.contains(w.since));
        assert!(!w.contains(w.until));
        assert!(w.contains(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_week_overlap_includes_straddling_weeks() {
        let w = window();
        // Week of 2023-12-31 straddles `since`.
        assert!(w.overlaps_week(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()));
        // Week of 2024-01-28 straddles `until`.
        assert!(w.overlaps_week(Utc.with_ymd_and_hms(2024, 1, 28, 0, 0, 0).unwrap()));
        // Week ending exactly at `since` does not overlap.
        assert!(!w.overlaps_week(Utc.with_ymd_and_hms(2023, 12, 25, 0, 0, 0).unwrap()));
        // Week starting at `until` does not overlap.
        assert!(!w.overlaps_week(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_repo_id_display() {
        let id = RepoId::new("acme", "core");
        assert_eq!(id.to_string(), "acme/core");
        assert_eq!(id.full_name(), "acme/core");
    }

    #[test]
    fn test_repository_entry_serializes_flat_status() {
        let entry = RepositoryEntry {
            org: "acme".to_string(),
            name: "huge".to_string(),
            status: RepoStatus::Degraded {
                reason: "statistics not ready".to_string(),
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "statistics not ready");

        let back: RepositoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_worst_status_wins() {
        let partial = RepoStatus::Partial {
            reason: "no statistics".to_string(),
        };
        let degraded = RepoStatus::Degraded {
            reason: "gone".to_string(),
        };
        assert_eq!(RepoStatus::Complete.worst(partial.clone()), partial);
        assert_eq!(partial.clone().worst(RepoStatus::Complete), partial);
        assert_eq!(partial.clone().worst(degraded.clone()), degraded);
        assert_eq!(degraded.clone().worst(partial.clone()), degraded);
        assert_eq!(partial.reason(), Some("no statistics"));
        assert_eq!(RepoStatus::Complete.reason(), None);
        assert_eq!(serde_json::to_value(&partial).unwrap()["status"], "partial");
    }

    #[test]
    fn test_metric_serialization() {
        assert_eq!(
            serde_json::to_string(&Metric::LinesAdded).unwrap(),
            "\"lines_added\""
        );
        assert_eq!(serde_json::to_string(&Mode::Slow).unwrap(), "\"slow\"");
    }
}
