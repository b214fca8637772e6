//! Error taxonomy for the fetch pipeline and dataset store.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while talking to GitHub or handling datasets.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-retryable 4xx response (bad token, missing org or repo).
    #[error("GitHub request failed with status {status}: {body}")]
    Request { status: u16, body: String },

    /// The rate limit was still exhausted after waiting for the reset.
    #[error("GitHub rate limit exceeded (resets at {reset_at})")]
    RateLimitExceeded { reset_at: DateTime<Utc> },

    /// Network failure or 5xx that outlived the retry budget.
    #[error("transient fetch failure after {attempts} attempts: {message}")]
    Transient { attempts: usize, message: String },

    /// GitHub was still computing repository statistics when polling ran out.
    #[error("contributor statistics still being computed after {attempts} attempts")]
    StatsNotReady { attempts: usize },

    /// A stored file was written with a schema this build does not understand.
    #[error(
        "unsupported schema version {found} in {path} (expected {expected}); re-run `ghcontrib fetch`"
    )]
    SchemaVersionMismatch {
        path: String,
        found: u32,
        expected: u32,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Another fetch run holds the output lock.
    #[error("output {path} is locked by another run (remove {lock} if no run is active)")]
    StoreLocked { path: String, lock: String },

    #[error("run cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the transient-retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// Whether this error must abort the whole run instead of degrading
    /// a single repository.
    pub fn is_run_fatal(&self) -> bool {
        match self {
            FetchError::Request { status, .. } => matches!(status, 401 | 403),
            FetchError::RateLimitExceeded { .. } => true,
            FetchError::Cancelled => true,
            _ => false,
        }
    }

    /// Short one-line reason for degraded-repository notices.
    pub fn short_reason(&self) -> String {
        match self {
            FetchError::Request { status, .. } => format!("request failed with status {}", status),
            FetchError::Transient { attempts, .. } => {
                format!("transient failure after {} attempts", attempts)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
