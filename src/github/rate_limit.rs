//! Rate-limit handling shared by every request of a run.
//!
//! [`RateLimitGate`] is the single reset clock: when any request learns that
//! the budget is exhausted it records the reset instant, and every request
//! (from any worker) waits on that same instant before going out.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::transport::HttpResponse;

/// Fallback wait when GitHub signals a limit without saying for how long.
const DEFAULT_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Shared reset clock.
#[derive(Debug, Default)]
pub struct RateLimitGate {
    reset: Mutex<Option<Reset>>,
}

#[derive(Debug, Clone, Copy)]
struct Reset {
    at: Instant,
    wall: DateTime<Utc>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Reset>> {
        self.reset.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record that the budget resets after `wait`. Returns the wall-clock
    /// reset time now in effect; a later reset never gets shortened.
    pub fn record(&self, wait: Duration) -> DateTime<Utc> {
        let candidate = Reset {
            at: Instant::now() + wait,
            wall: Utc::now() + chrono::Duration::from_std(wait).unwrap_or_default(),
        };
        let mut guard = self.lock();
        let effective = match *guard {
            Some(existing) if existing.at >= candidate.at => existing,
            _ => candidate,
        };
        *guard = Some(effective);
        effective.wall
    }

    /// Time left until the recorded reset, if one is pending.
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self.lock();
        guard.and_then(|r| {
            let now = Instant::now();
            (r.at > now).then(|| r.at - now)
        })
    }

    /// Wait until no reset is pending.
    pub async fn wait(&self) {
        while let Some(left) = self.remaining() {
            debug!("Waiting {}s for rate limit reset", left.as_secs());
            tokio::time::sleep(left).await;
        }
    }
}

/// How long to back off when `response` is a rate-limit signal, or `None`
/// when it is an ordinary response (including a plain 403 Forbidden).
pub fn limit_wait(response: &HttpResponse, now: DateTime<Utc>) -> Option<Duration> {
    if response.status != 403 && response.status != 429 {
        return None;
    }

    if let Some(secs) = response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }

    let exhausted = response.header("x-ratelimit-remaining").map(str::trim) == Some("0");
    if exhausted {
        let wait = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .map(|reset| (reset - now).to_std().unwrap_or_default() + Duration::from_secs(1))
            .unwrap_or(DEFAULT_LIMIT_WAIT);
        return Some(wait);
    }

    if response.status == 429 {
        return Some(DEFAULT_LIMIT_WAIT);
    }

    // Secondary rate limits come back as 403 with an explanatory message.
    let body = String::from_utf8_lossy(&response.body).to_lowercase();
    if body.contains("rate limit") {
        warn!("Secondary rate limit hit");
        return Some(DEFAULT_LIMIT_WAIT);
    }

    None
}

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Proactive request throttle (requests per second).
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Returns `None` when throttling is disabled (`0`).
    pub fn new(requests_per_second: u32) -> Option<Self> {
        let rps = NonZeroU32::new(requests_per_second)?;
        Some(Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }

    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}
