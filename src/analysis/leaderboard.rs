//! Leaderboard building.
//!
//! This module turns a dataset's flat records into the ranked tables the
//! Markdown report and the dashboard render: contributors, repositories,
//! organizations, and the org-by-contributor and contributor-by-repository
//! drill-downs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Dataset, Metric, Mode, RepositoryEntry, TimeWindow, UNKNOWN_CONTRIBUTOR};

/// Version of the leaderboard file format.
pub const LEADERBOARD_VERSION: u32 = 1;

/// Per-metric sums of one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub commits: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub prs_opened: u64,
    pub prs_reviewed: u64,
    pub comments: u64,
}

impl MetricTotals {
    pub fn add(&mut self, metric: Metric, value: u64) {
        let slot = match metric {
            Metric::Commits => &mut self.commits,
            Metric::LinesAdded => &mut self.lines_added,
            Metric::LinesRemoved => &mut self.lines_removed,
            Metric::PrsOpened => &mut self.prs_opened,
            Metric::PrsReviewed => &mut self.prs_reviewed,
            Metric::Comments => &mut self.comments,
        };
        *slot += value;
    }

    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Commits => self.commits,
            Metric::LinesAdded => self.lines_added,
            Metric::LinesRemoved => self.lines_removed,
            Metric::PrsOpened => self.prs_opened,
            Metric::PrsReviewed => self.prs_reviewed,
            Metric::Comments => self.comments,
        }
    }

    /// Activity count used for ranking. Line churn is not an activity.
    pub fn total_contributions(&self) -> u64 {
        self.commits + self.prs_opened + self.prs_reviewed + self.comments
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRow {
    pub login: String,
    /// Absent for contributions without an account.
    pub profile_url: Option<String>,
    pub repositories: usize,
    pub totals: MetricTotals,
    pub total_contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRow {
    pub org: String,
    pub name: String,
    pub pulse_url: String,
    pub contributors: usize,
    /// Degraded or partial during fetch.
    pub incomplete: bool,
    pub totals: MetricTotals,
    pub total_contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRow {
    pub org: String,
    pub repositories: usize,
    pub contributors: usize,
    pub totals: MetricTotals,
    pub total_contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgContributorRow {
    pub org: String,
    pub login: String,
    pub totals: MetricTotals,
    pub total_contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRepoRow {
    pub login: String,
    pub org: String,
    pub repo: String,
    /// Pull requests the contributor authored in this repository.
    pub pulls_url: String,
    pub totals: MetricTotals,
    pub total_contributions: u64,
}

/// Everything the rendering layer needs, derived from one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub orgs: Vec<String>,
    pub window: TimeWindow,
    pub mode: Mode,
    /// Metric columns worth showing for this mode.
    pub columns: Vec<Metric>,
    pub contributors: Vec<ContributorRow>,
    pub repositories: Vec<RepositoryRow>,
    pub organizations: Vec<OrganizationRow>,
    pub org_contributors: Vec<OrgContributorRow>,
    pub contributor_repos: Vec<ContributorRepoRow>,
    /// Repositories that did not aggregate completely.
    pub incomplete: Vec<RepositoryEntry>,
}

pub fn profile_url(login: &str) -> Option<String> {
    (login != UNKNOWN_CONTRIBUTOR).then(|| format!("https://github.com/{}", login))
}

pub fn pulse_url(org: &str, repo: &str) -> String {
    format!("https://github.com/{}/{}/pulse", org, repo)
}

fn pulls_url(org: &str, repo: &str, login: &str) -> String {
    format!("https://github.com/{}/{}/pulls?q=author:{}", org, repo, login)
}

/// Highest activity first, then by name.
fn rank<T>(rows: &mut [T], key: impl Fn(&T) -> (u64, String)) {
    rows.sort_by(|a, b| {
        let (ta, na) = key(a);
        let (tb, nb) = key(b);
        tb.cmp(&ta).then_with(|| na.cmp(&nb))
    });
}

pub fn build_leaderboard(dataset: &Dataset) -> Leaderboard {
    let mut by_contributor: BTreeMap<&str, (MetricTotals, BTreeSet<(&str, &str)>)> =
        BTreeMap::new();
    let mut by_repo: BTreeMap<(&str, &str), (MetricTotals, BTreeSet<&str>)> = BTreeMap::new();
    let mut by_org: BTreeMap<&str, (MetricTotals, BTreeSet<&str>, BTreeSet<&str>)> =
        BTreeMap::new();
    let mut by_org_contributor: BTreeMap<(&str, &str), MetricTotals> = BTreeMap::new();
    let mut by_contributor_repo: BTreeMap<(&str, &str, &str), MetricTotals> = BTreeMap::new();

    // Every org and repository shows up, even with no records.
    for org in &dataset.orgs {
        by_org.entry(org.as_str()).or_default();
    }
    for entry in &dataset.repositories {
        by_repo
            .entry((entry.org.as_str(), entry.name.as_str()))
            .or_default();
        by_org
            .entry(entry.org.as_str())
            .or_default()
            .1
            .insert(entry.name.as_str());
    }

    for r in &dataset.records {
        let (org, repo, who) = (r.org.as_str(), r.repo.as_str(), r.contributor.as_str());

        let contributor = by_contributor.entry(who).or_default();
        contributor.0.add(r.metric, r.value);
        contributor.1.insert((org, repo));

        let repository = by_repo.entry((org, repo)).or_default();
        repository.0.add(r.metric, r.value);
        repository.1.insert(who);

        let organization = by_org.entry(org).or_default();
        organization.0.add(r.metric, r.value);
        organization.1.insert(repo);
        organization.2.insert(who);

        by_org_contributor
            .entry((org, who))
            .or_default()
            .add(r.metric, r.value);
        by_contributor_repo
            .entry((who, org, repo))
            .or_default()
            .add(r.metric, r.value);
    }

    let incomplete_set: BTreeSet<(&str, &str)> = dataset
        .incomplete()
        .map(|e| (e.org.as_str(), e.name.as_str()))
        .collect();

    let mut contributors: Vec<ContributorRow> = by_contributor
        .into_iter()
        .map(|(login, (totals, repos))| ContributorRow {
            login: login.to_string(),
            profile_url: profile_url(login),
            repositories: repos.len(),
            totals,
            total_contributions: totals.total_contributions(),
        })
        .collect();
    rank(&mut contributors, |r| (r.total_contributions, r.login.clone()));

    let mut repositories: Vec<RepositoryRow> = by_repo
        .into_iter()
        .map(|((org, name), (totals, people))| RepositoryRow {
            org: org.to_string(),
            name: name.to_string(),
            pulse_url: pulse_url(org, name),
            contributors: people.len(),
            incomplete: incomplete_set.contains(&(org, name)),
            totals,
            total_contributions: totals.total_contributions(),
        })
        .collect();
    rank(&mut repositories, |r| {
        (r.total_contributions, format!("{}/{}", r.org, r.name))
    });

    let mut organizations: Vec<OrganizationRow> = by_org
        .into_iter()
        .map(|(org, (totals, repos, people))| OrganizationRow {
            org: org.to_string(),
            repositories: repos.len(),
            contributors: people.len(),
            totals,
            total_contributions: totals.total_contributions(),
        })
        .collect();
    rank(&mut organizations, |r| (r.total_contributions, r.org.clone()));

    let mut org_contributors: Vec<OrgContributorRow> = by_org_contributor
        .into_iter()
        .map(|((org, login), totals)| OrgContributorRow {
            org: org.to_string(),
            login: login.to_string(),
            totals,
            total_contributions: totals.total_contributions(),
        })
        .collect();
    rank(&mut org_contributors, |r| {
        (r.total_contributions, format!("{}/{}", r.org, r.login))
    });

    let mut contributor_repos: Vec<ContributorRepoRow> = by_contributor_repo
        .into_iter()
        .map(|((login, org, repo), totals)| ContributorRepoRow {
            login: login.to_string(),
            org: org.to_string(),
            repo: repo.to_string(),
            pulls_url: pulls_url(org, repo, login),
            totals,
            total_contributions: totals.total_contributions(),
        })
        .collect();
    rank(&mut contributor_repos, |r| {
        (r.total_contributions, format!("{}/{}/{}", r.login, r.org, r.repo))
    });

    let columns = match dataset.mode {
        Mode::Quick => Metric::QUICK.to_vec(),
        Mode::Slow => Metric::ALL.to_vec(),
    };

    Leaderboard {
        schema_version: LEADERBOARD_VERSION,
        generated_at: dataset.generated_at,
        orgs: dataset.orgs.clone(),
        window: dataset.window,
        mode: dataset.mode,
        columns,
        contributors,
        repositories,
        organizations,
        org_contributors,
        contributor_repos,
        incomplete: dataset.incomplete().cloned().collect(),
    }
}
