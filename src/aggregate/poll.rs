//! Bounded polling for upstream data that may not be ready yet.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::retry::PollPolicy;

/// State of a resource that GitHub computes lazily.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    Ready(T),
    NotReady,
    /// Still not ready after the last attempt.
    GaveUp { attempts: usize },
}

/// Call `probe` until it reports [`PollState::Ready`] or the policy runs out.
///
/// The result is never [`PollState::NotReady`]. Errors from `probe` end the
/// loop immediately.
pub async fn poll_with_deadline<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<PollState<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>>>,
{
    let mut delays = policy.delays();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        if let PollState::Ready(value) = probe().await? {
            return Ok(PollState::Ready(value));
        }

        let Some(delay) = delays.next() else {
            return Ok(PollState::GaveUp { attempts });
        };
        debug!("Not ready after attempt {}; polling again in {:?}", attempts, delay);
        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
