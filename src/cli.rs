//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::Mode;

/// ghcontrib - contributor leaderboards across GitHub organizations
///
/// Fetch contribution data from the GitHub API into a dataset file, then
/// turn it into leaderboards and a static dashboard.
///
/// Examples:
///   ghcontrib fetch --orgs acme,globex --since 2024-01-01
///   ghcontrib fetch --orgs acme --slow --top-n-repos 20
///   ghcontrib parse --input contributions.json --markdown LEADERBOARD.md
///   ghcontrib dashboard
///   ghcontrib init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ghcontrib.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect contribution data from GitHub into a dataset file
    Fetch(FetchArgs),

    /// Build leaderboards from a dataset file
    Parse(ParseArgs),

    /// Render a static HTML dashboard from a leaderboard file
    Dashboard(DashboardArgs),

    /// Generate a default .ghcontrib.toml configuration file
    InitConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FetchArgs {
    /// Organizations to scan (comma-separated)
    #[arg(long, value_name = "ORGS", value_delimiter = ',', env = "GITHUB_ORGS")]
    pub orgs: Option<Vec<String>>,

    /// GitHub access token
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Start of the window (RFC 3339 or YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "TIME", value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// End of the window (RFC 3339 or YYYY-MM-DD, exclusive; defaults to now)
    #[arg(long, value_name = "TIME", value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,

    /// Keep only the N most recently pushed repositories per organization
    #[arg(long, value_name = "N")]
    pub top_n_repos: Option<usize>,

    /// Repositories to skip, by name or org/name (comma-separated)
    #[arg(long, value_name = "REPOS", value_delimiter = ',')]
    pub exclude_repos: Option<Vec<String>>,

    /// Data acquisition mode
    #[arg(long, value_name = "MODE", conflicts_with = "slow")]
    pub mode: Option<Mode>,

    /// Shorthand for --mode slow
    #[arg(long)]
    pub slow: bool,

    /// Include archived repositories
    #[arg(long)]
    pub include_archived: bool,

    /// Number of repositories aggregated in parallel
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Dataset output path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write discovered repository metadata to this file
    #[arg(long, value_name = "FILE")]
    pub output_repos: Option<PathBuf>,

    /// GitHub REST API base URL
    #[arg(long, value_name = "URL", env = "GITHUB_API_URL")]
    pub api_url: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ParseArgs {
    /// Dataset produced by `fetch`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Leaderboard JSON output path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write a Markdown leaderboard
    #[arg(long, value_name = "FILE")]
    pub markdown: Option<PathBuf>,

    /// Rows per table in the Markdown output
    #[arg(long, default_value = "25", value_name = "N")]
    pub limit: usize,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DashboardArgs {
    /// Leaderboard produced by `parse`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// HTML output path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Accept RFC 3339 timestamps or a bare date meaning midnight UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DD", value))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Fetch(fetch) => {
                if fetch.concurrency == Some(0) {
                    return Err("Concurrency must be at least 1".to_string());
                }
                if fetch.top_n_repos == Some(0) {
                    return Err("--top-n-repos must be at least 1".to_string());
                }
                if let Some(ref url) = fetch.api_url {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err("API URL must start with 'http://' or 'https://'".to_string());
                    }
                }
                if let (Some(since), Some(until)) = (fetch.since, fetch.until) {
                    if since >= until {
                        return Err("--since must be earlier than --until".to_string());
                    }
                }
            }
            Command::Parse(parse) => {
                if parse.limit == 0 {
                    return Err("--limit must be at least 1".to_string());
                }
            }
            Command::Dashboard(_) | Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
