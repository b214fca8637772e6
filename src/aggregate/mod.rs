//! Per-repository contribution collection.
//!
//! Quick and slow mode are two implementations of [`Aggregator`], picked
//! once from the run settings.

pub mod poll;
pub mod quick;
pub mod slow;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::Result;
use crate::github::ApiClient;
use crate::models::{Contribution, Mode, Repository, TimeWindow};
use crate::retry::PollPolicy;

pub use quick::QuickAggregator;
pub use slow::SlowAggregator;

/// What aggregation produced for one repository.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoOutcome {
    Collected(Vec<Contribution>),
    /// Some sources answered, one did not.
    Partial {
        contributions: Vec<Contribution>,
        reason: String,
    },
    /// Recorded with zero contributions; the run continues.
    Degraded { reason: String },
}

impl RepoOutcome {
    /// Why aggregation fell short, if it did.
    pub fn reason(&self) -> Option<&str> {
        match self {
            RepoOutcome::Collected(_) => None,
            RepoOutcome::Partial { reason, .. } | RepoOutcome::Degraded { reason } => Some(reason),
        }
    }
}

/// Produces contributions for a single repository.
#[async_trait]
pub trait Aggregator: Send + Sync {
    fn mode(&self) -> Mode;

    /// Collect contributions inside the run window.
    ///
    /// Errors are returned unclassified; the caller decides whether they
    /// abort the run or degrade the repository.
    async fn collect(&self, repo: &Repository) -> Result<RepoOutcome>;
}

/// Inputs shared by both aggregators.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub window: TimeWindow,
    pub poll: PollPolicy,
    /// Extra lookback when listing pull requests.
    pub pr_window_slack: Duration,
}

/// Build the aggregator for `mode`.
pub fn for_mode(mode: Mode, client: Arc<ApiClient>, options: AggregateOptions) -> Arc<dyn Aggregator> {
    match mode {
        Mode::Quick => Arc::new(QuickAggregator::new(client, options)),
        Mode::Slow => Arc::new(SlowAggregator::new(client, options)),
    }
}
