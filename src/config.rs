//! Configuration file handling.
//!
//! This module handles loading `.ghcontrib.toml`, merging it with CLI
//! arguments, and resolving the immutable settings a fetch run is given.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{Mode, TimeWindow};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".ghcontrib.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubSettings,

    #[serde(default)]
    pub fetch: FetchDefaults,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub stats: StatsSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

/// GitHub API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    /// REST API base URL (GitHub Enterprise uses `https://host/api/v3`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Page size for list endpoints (GitHub caps this at 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Proactive throttle; 0 disables it.
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
            per_page: default_per_page(),
            requests_per_second: default_rps(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_per_page() -> u32 {
    100
}

fn default_rps() -> u32 {
    10
}

fn default_user_agent() -> String {
    format!("ghcontrib/{}", env!("CARGO_PKG_VERSION"))
}

/// Defaults for the `fetch` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchDefaults {
    #[serde(default)]
    pub orgs: Vec<String>,

    #[serde(default)]
    pub exclude_repos: Vec<String>,

    #[serde(default)]
    pub top_n_repos: Option<usize>,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub include_archived: bool,

    /// Repositories aggregated in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Window length when `--since` is not given.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Extra days before `since` when listing pull requests in slow mode.
    #[serde(default = "default_pr_slack")]
    pub pr_window_slack_days: i64,
}

impl Default for FetchDefaults {
    fn default() -> Self {
        Self {
            orgs: Vec::new(),
            exclude_repos: Vec::new(),
            top_n_repos: None,
            mode: Mode::Quick,
            include_archived: false,
            concurrency: default_concurrency(),
            window_days: default_window_days(),
            pr_window_slack_days: default_pr_slack(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_window_days() -> i64 {
    30
}

fn default_pr_slack() -> i64 {
    7
}

/// Transient-failure and rate-limit retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Retries after waiting out a rate limit.
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: usize,

    #[serde(default = "default_max_rate_limit_wait")]
    pub max_rate_limit_wait_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            rate_limit_retries: default_rate_limit_retries(),
            max_rate_limit_wait_seconds: default_max_rate_limit_wait(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_min_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    8000
}

fn default_rate_limit_retries() -> usize {
    1
}

fn default_max_rate_limit_wait() -> u64 {
    3900 // one full hourly window plus slack
}

/// Polling of the contributor statistics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSettings {
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: usize,

    #[serde(default = "default_poll_initial_delay")]
    pub poll_initial_delay_ms: u64,

    #[serde(default = "default_poll_max_delay")]
    pub poll_max_delay_ms: u64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_initial_delay_ms: default_poll_initial_delay(),
            poll_max_delay_ms: default_poll_max_delay(),
        }
    }
}

fn default_poll_attempts() -> usize {
    5
}

fn default_poll_initial_delay() -> u64 {
    2000
}

fn default_poll_max_delay() -> u64 {
    30_000
}

/// Default file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,

    #[serde(default = "default_leaderboard")]
    pub leaderboard: PathBuf,

    #[serde(default = "default_dashboard")]
    pub dashboard: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            leaderboard: default_leaderboard(),
            dashboard: default_dashboard(),
        }
    }
}

fn default_dataset() -> PathBuf {
    PathBuf::from("contributions.json")
}

fn default_leaderboard() -> PathBuf {
    PathBuf::from("leaderboard.json")
}

fn default_dashboard() -> PathBuf {
    PathBuf::from("dashboard.html")
}

/// Everything a fetch run needs, resolved once and passed explicitly.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub orgs: Vec<String>,
    pub token: String,
    pub window: TimeWindow,
    pub mode: Mode,
    pub top_n_repos: Option<usize>,
    pub exclude_repos: Vec<String>,
    pub include_archived: bool,
    pub concurrency: usize,
    pub pr_window_slack: Duration,
    pub output: PathBuf,
    pub output_repos: Option<PathBuf>,
    pub github: GitHubSettings,
    pub retry: RetrySettings,
    pub stats: StatsSettings,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Resolve the settings of a fetch run. CLI values win over the file.
    pub fn resolve_fetch(
        &self,
        args: &crate::cli::FetchArgs,
        now: DateTime<Utc>,
    ) -> Result<FetchSettings> {
        let orgs: Vec<String> = args
            .orgs
            .clone()
            .unwrap_or_else(|| self.fetch.orgs.clone())
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if orgs.is_empty() {
            bail!("No organizations given. Use --orgs or set GITHUB_ORGS.");
        }

        let token = match args.token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => bail!("No GitHub token given. Use --token or set GH_TOKEN."),
        };

        let until = args.until.unwrap_or(now);
        let since = args
            .since
            .unwrap_or_else(|| until - Duration::days(self.fetch.window_days));
        if since >= until {
            bail!(
                "--since ({}) must be earlier than --until ({})",
                since.to_rfc3339(),
                until.to_rfc3339()
            );
        }

        let mode = if args.slow {
            Mode::Slow
        } else {
            args.mode.unwrap_or(self.fetch.mode)
        };

        let exclude_repos = args
            .exclude_repos
            .clone()
            .unwrap_or_else(|| self.fetch.exclude_repos.clone())
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let mut github = self.github.clone();
        if let Some(ref api_url) = args.api_url {
            github.api_url = api_url.clone();
        }

        Ok(FetchSettings {
            orgs,
            token,
            window: TimeWindow::new(since, until),
            mode,
            top_n_repos: args.top_n_repos.or(self.fetch.top_n_repos),
            exclude_repos,
            include_archived: args.include_archived || self.fetch.include_archived,
            concurrency: args.concurrency.unwrap_or(self.fetch.concurrency).max(1),
            pr_window_slack: Duration::days(self.fetch.pr_window_slack_days.max(0)),
            output: args
                .output
                .clone()
                .unwrap_or_else(|| self.output.dataset.clone()),
            output_repos: args.output_repos.clone(),
            github,
            retry: self.retry.clone(),
            stats: self.stats.clone(),
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
