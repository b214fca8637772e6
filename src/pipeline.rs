//! The fetch run.
//!
//! Discovering → Aggregating → Merging → Persisted. Discovery errors abort
//! the run. During aggregation a repository-scoped error degrades that
//! repository, while an authorization or rate-limit failure cancels every
//! in-flight worker and aborts the run without writing a dataset.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::aggregate::{self, AggregateOptions, RepoOutcome};
use crate::analysis::{merge, DatasetHeader, RepoResult};
use crate::config::FetchSettings;
use crate::discovery::{discover, DiscoveryFilter};
use crate::error::{FetchError, Result};
use crate::github::ApiClient;
use crate::models::{Mode, Repository, RepositoryEntry};
use crate::retry::PollPolicy;
use crate::store::{self, RunLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Discovering,
    Aggregating,
    Merging,
    Persisted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Discovering => "discovering",
            RunState::Aggregating => "aggregating",
            RunState::Merging => "merging",
            RunState::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub output: PathBuf,
    pub mode: Mode,
    pub repositories: usize,
    pub contributors: usize,
    pub records: usize,
    /// Degraded or partial repositories.
    pub incomplete: Vec<RepositoryEntry>,
    pub elapsed: Duration,
}

pub struct FetchPipeline {
    client: Arc<ApiClient>,
    settings: FetchSettings,
    show_progress: bool,
}

impl FetchPipeline {
    pub fn new(client: Arc<ApiClient>, settings: FetchSettings) -> Self {
        Self {
            client,
            settings,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn enter(&self, state: RunState) {
        info!("Fetch run {}", state);
    }

    pub async fn run(&self) -> Result<FetchReport> {
        let started = Instant::now();
        let lock = RunLock::acquire(&self.settings.output)?;
        debug!("Holding {}", lock.path().display());

        self.enter(RunState::Discovering);
        let repos = self.discover_all().await?;
        if let Some(ref path) = self.settings.output_repos {
            store::write_repositories(path, &repos)?;
        }

        self.enter(RunState::Aggregating);
        let results = self.aggregate_all(repos).await?;

        self.enter(RunState::Merging);
        let header = DatasetHeader {
            generated_at: Utc::now(),
            orgs: self.settings.orgs.clone(),
            window: self.settings.window,
            mode: self.settings.mode,
        };
        let dataset = merge(header, &results);

        store::write_dataset(&self.settings.output, &dataset)?;
        self.enter(RunState::Persisted);
        drop(lock);

        let contributors = dataset
            .records
            .iter()
            .map(|r| r.contributor.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        Ok(FetchReport {
            output: self.settings.output.clone(),
            mode: dataset.mode,
            repositories: dataset.repositories.len(),
            contributors,
            records: dataset.records.len(),
            incomplete: dataset.incomplete().cloned().collect(),
            elapsed: started.elapsed(),
        })
    }

    async fn discover_all(&self) -> Result<Vec<Repository>> {
        let filter = DiscoveryFilter {
            exclude: self.settings.exclude_repos.clone(),
            top_n: self.settings.top_n_repos,
            include_archived: self.settings.include_archived,
        };

        let mut repos = Vec::new();
        for org in &self.settings.orgs {
            let found = discover(&self.client, org, &filter).await.map_err(|e| {
                error!("Discovery failed for {}: {}", org, e);
                e
            })?;
            repos.extend(found);
        }
        info!(
            "Aggregating {} repositories across {} organizations ({} mode)",
            repos.len(),
            self.settings.orgs.len(),
            self.settings.mode
        );
        Ok(repos)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    async fn aggregate_all(&self, repos: Vec<Repository>) -> Result<Vec<RepoResult>> {
        let options = AggregateOptions {
            window: self.settings.window,
            poll: PollPolicy::from(&self.settings.stats),
            pr_window_slack: self.settings.pr_window_slack,
        };
        let aggregator = aggregate::for_mode(self.settings.mode, self.client.clone(), options);
        debug!("Using the {} mode aggregator", aggregator.mode());
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let cancel = self.client.cancellation().clone();
        let progress = self.progress_bar(repos.len());

        let mut handles = Vec::with_capacity(repos.len());
        for repo in repos {
            let semaphore = Arc::clone(&semaphore);
            let aggregator = Arc::clone(&aggregator);
            let cancel = cancel.clone();
            let progress = progress.clone();
            let id = repo.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }

                progress.set_message(repo.id.to_string());
                let outcome = match aggregator.collect(&repo).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_run_fatal() => {
                        cancel.cancel();
                        return Err(e);
                    }
                    Err(e) => {
                        warn!("{}: {}; recording zero contributions", repo.id, e);
                        RepoOutcome::Degraded {
                            reason: e.short_reason(),
                        }
                    }
                };
                progress.inc(1);
                Ok(RepoResult {
                    repo: repo.id,
                    outcome,
                })
            });
            handles.push((id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut fatal: Option<FetchError> = None;
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    debug!("{}: aborted: {}", id, e);
                    // Keep the root cause, not the cancellations it triggered.
                    if fatal.as_ref().map_or(true, |f| matches!(f, FetchError::Cancelled)) {
                        fatal = Some(e);
                    }
                }
                Err(join_error) => {
                    warn!("{}: worker failed: {}", id, join_error);
                    results.push(RepoResult {
                        repo: id,
                        outcome: RepoOutcome::Degraded {
                            reason: format!("worker failed: {}", join_error),
                        },
                    });
                }
            }
        }
        progress.finish_and_clear();

        if let Some(e) = fatal {
            return Err(e);
        }
        let incomplete = results.iter().filter(|r| r.outcome.reason().is_some()).count();
        if incomplete > 0 {
            warn!("{} of {} repositories incomplete", incomplete, results.len());
        }
        Ok(results)
    }
}
