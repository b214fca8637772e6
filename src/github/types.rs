//! GitHub REST API payload types.
//!
//! Only the fields the pipeline reads are modelled; everything else in the
//! responses is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{RepoId, Repository, UNKNOWN_CONTRIBUTOR};

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

/// Login of an optional user, falling back to [`UNKNOWN_CONTRIBUTOR`].
pub fn login_of(user: &Option<User>) -> String {
    user.as_ref()
        .map(|u| u.login.clone())
        .unwrap_or_else(|| UNKNOWN_CONTRIBUTOR.to_string())
}

/// Entry of `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoPayload {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl RepoPayload {
    pub fn into_repository(self, org: &str) -> Repository {
        let full_name = if self.full_name.is_empty() {
            format!("{}/{}", org, self.name)
        } else {
            self.full_name
        };
        Repository {
            id: RepoId::new(org, self.name),
            full_name,
            html_url: self.html_url,
            private: self.private,
            archived: self.archived,
            fork: self.fork,
            language: self.language,
            size: self.size,
            stargazers_count: self.stargazers_count,
            forks_count: self.forks_count,
            open_issues_count: self.open_issues_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            pushed_at: self.pushed_at,
        }
    }
}

/// Entry of `GET /repos/{owner}/{repo}/stats/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorStats {
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub weeks: Vec<WeekStats>,
}

/// One weekly bucket: `w` is the week start as a Unix timestamp.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WeekStats {
    pub w: i64,
    #[serde(default)]
    pub a: u64,
    #[serde(default)]
    pub d: u64,
    #[serde(default)]
    pub c: u64,
}

impl WeekStats {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.w, 0)
    }
}

/// Entry of `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry of `GET /repos/{owner}/{repo}/pulls/{n}/reviews`.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub user: Option<User>,
    /// Absent for pending reviews.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Review comment or issue comment.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
}
