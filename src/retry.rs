//! Retry and polling policies.
//!
//! Transient request failures use exponential backoff with jitter; the
//! statistics poll loop uses the same builder without jitter so its delays
//! are predictable.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use crate::config::{RetrySettings, StatsSettings};

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            max_retries: 3,
            with_jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            Duration::from_millis(settings.min_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.max_retries,
        )
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Bounded polling schedule for "not ready yet" upstream resources.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&StatsSettings> for PollPolicy {
    fn from(settings: &StatsSettings) -> Self {
        Self {
            max_attempts: settings.poll_attempts.max(1),
            initial_delay: Duration::from_millis(settings.poll_initial_delay_ms),
            max_delay: Duration::from_millis(settings.poll_max_delay_ms),
        }
    }
}

impl PollPolicy {
    /// Delays to sleep between consecutive attempts (one fewer than attempts).
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        RetryConfig::new(
            self.initial_delay,
            self.max_delay,
            self.max_attempts.saturating_sub(1),
        )
        .with_jitter(false)
        .into_backoff()
        .build()
    }
}
