//! Retrying, rate-limit aware GitHub REST client.
//!
//! The client is read-only: it issues authenticated GET requests, retries
//! transient failures with exponential backoff, waits out rate limits on the
//! shared [`RateLimitGate`], and exposes paginated endpoints as lazy streams.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::pagination::next_link;
use super::rate_limit::{limit_wait, ApiRateLimiter, RateLimitGate};
use super::transport::{HttpRequest, HttpTransport};
use crate::config::{GitHubSettings, RetrySettings};
use crate::error::{FetchError, Result};
use crate::retry::RetryConfig;

/// Longest error body kept in a [`FetchError::Request`].
const MAX_ERROR_BODY: usize = 500;

/// Client settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_url: String,
    pub per_page: u32,
    pub retry: RetryConfig,
    /// How many times a rate-limited request is retried after waiting.
    pub rate_limit_retries: usize,
    /// Resets farther away than this fail immediately.
    pub max_rate_limit_wait: Duration,
    /// Proactive throttle; 0 disables it.
    pub requests_per_second: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            per_page: 100,
            retry: RetryConfig::default(),
            rate_limit_retries: 1,
            max_rate_limit_wait: Duration::from_secs(3900),
            requests_per_second: 10,
        }
    }
}

impl ClientOptions {
    pub fn from_settings(github: &GitHubSettings, retry: &RetrySettings) -> Self {
        Self {
            api_url: github.api_url.clone(),
            per_page: github.per_page,
            retry: RetryConfig::from(retry),
            rate_limit_retries: retry.rate_limit_retries,
            max_rate_limit_wait: Duration::from_secs(retry.max_rate_limit_wait_seconds),
            requests_per_second: github.requests_per_second,
        }
    }
}

/// A decoded 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// `Value::Null` when the body was empty.
    pub body: Value,
    /// Next page URL from the `Link` header.
    pub next: Option<String>,
}

impl ApiResponse {
    fn into_items(self, url: &str) -> Result<Vec<Value>> {
        match self.body {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(FetchError::Decode {
                url: url.to_string(),
                message: format!("expected a JSON array, got {}", kind_of(&other)),
            }),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Outcome of a single HTTP exchange.
enum Sent {
    Response(ApiResponse),
    Limited(Duration),
}

pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: String,
    options: ClientOptions,
    gate: Arc<RateLimitGate>,
    throttle: Option<ApiRateLimiter>,
    cancel: CancellationToken,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, token: String, options: ClientOptions) -> Self {
        let base_url = options.api_url.trim_end_matches('/').to_string();
        let throttle = ApiRateLimiter::new(options.requests_per_second);
        Self {
            transport,
            base_url,
            token,
            options,
            gate: Arc::new(RateLimitGate::new()),
            throttle,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts every in-flight and future request of this client.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn url_for(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if params.is_empty() {
            reqwest::Url::parse(&raw)
        } else {
            reqwest::Url::parse_with_params(&raw, params.iter().map(|(k, v)| (*k, v.as_str())))
        };
        url.map(String::from).map_err(|e| FetchError::Decode {
            url: raw,
            message: format!("invalid URL: {}", e),
        })
    }

    /// GET `path` with query `params` and return the decoded body.
    ///
    /// Any 2xx status is returned to the caller, so endpoints that answer
    /// `202 Accepted` while computing can be polled.
    pub async fn request(&self, path: &str, params: &[(&str, String)]) -> Result<ApiResponse> {
        let url = self.url_for(path, params)?;
        self.fetch_url(&url).await
    }

    /// Lazily walk every page of a list endpoint, yielding items in order.
    ///
    /// Pages are requested only as the stream is polled, so dropping the
    /// stream early stops further requests.
    pub fn paginate<'a>(
        &'a self,
        path: &str,
        params: &[(&str, String)],
    ) -> impl Stream<Item = Result<Value>> + 'a {
        let mut params = params.to_vec();
        if !params.iter().any(|(k, _)| *k == "per_page") {
            params.push(("per_page", self.options.per_page.to_string()));
        }
        let first: Option<Result<String>> = Some(self.url_for(path, &params));

        stream::try_unfold(first, move |next| async move {
            let url = match next {
                Some(url) => url?,
                None => return Ok(None),
            };
            let page = self.fetch_url(&url).await?;
            let following = page.next.clone().map(Ok);
            let items = page.into_items(&url)?;
            debug!("Fetched {} items from {}", items.len(), url);
            Ok(Some((
                stream::iter(items.into_iter().map(Ok::<Value, FetchError>)),
                following,
            )))
        })
        .try_flatten()
    }

    /// [`paginate`](Self::paginate), decoding each item as `T`.
    pub fn paginate_as<'a, T: DeserializeOwned + 'a>(
        &'a self,
        path: &str,
        params: &[(&str, String)],
    ) -> impl Stream<Item = Result<T>> + 'a {
        let source = path.to_string();
        self.paginate(path, params).map(move |item| {
            item.and_then(|value| {
                serde_json::from_value::<T>(value).map_err(|e| FetchError::Decode {
                    url: source.clone(),
                    message: e.to_string(),
                })
            })
        })
    }

    async fn fetch_url(&self, url: &str) -> Result<ApiResponse> {
        let mut limit_hits = 0usize;
        let max_attempts = self.options.retry.max_retries + 1;

        loop {
            let outcome = (|| self.send_once(url))
                .retry(self.options.retry.clone().into_backoff())
                .when(|e: &FetchError| e.is_retryable() && !self.cancel.is_cancelled())
                .notify(|err: &FetchError, dur: Duration| {
                    debug!("Retrying {} in {:?}: {}", url, dur, err);
                })
                .await;

            match outcome {
                Ok(Sent::Response(response)) => return Ok(response),
                Ok(Sent::Limited(wait)) => {
                    let reset_at = self.gate.record(wait);
                    if limit_hits >= self.options.rate_limit_retries
                        || wait > self.options.max_rate_limit_wait
                    {
                        return Err(FetchError::RateLimitExceeded { reset_at });
                    }
                    limit_hits += 1;
                    warn!(
                        "Rate limit reached; waiting {}s (until {}) before retrying",
                        wait.as_secs(),
                        reset_at.format("%H:%M:%S UTC")
                    );
                }
                Err(FetchError::Transient { message, .. }) => {
                    return Err(FetchError::Transient {
                        attempts: max_attempts,
                        message,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str) -> Result<Sent> {
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = self.gate.wait() => {}
        }
        if let Some(throttle) = &self.throttle {
            throttle.wait().await;
        }

        let request = HttpRequest {
            url: url.to_string(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", self.token)),
                (
                    "Accept".to_string(),
                    "application/vnd.github+json".to_string(),
                ),
                ("X-GitHub-Api-Version".to_string(), "2022-11-28".to_string()),
            ],
        };

        let sent = tokio::select! {
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            sent = self.transport.get(request) => sent,
        };
        let response = sent.map_err(|e| FetchError::Transient {
            attempts: 1,
            message: format!("GET {}: {}", url, e),
        })?;

        if let Some(wait) = limit_wait(&response, Utc::now()) {
            return Ok(Sent::Limited(wait));
        }

        match response.status {
            200..=299 => {
                let body = if response.body.iter().all(u8::is_ascii_whitespace) {
                    Value::Null
                } else {
                    serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?
                };
                let next = response.header("link").and_then(next_link);
                Ok(Sent::Response(ApiResponse {
                    status: response.status,
                    body,
                    next,
                }))
            }
            500..=599 => Err(FetchError::Transient {
                attempts: 1,
                message: format!("GET {} returned {}", url, response.status),
            }),
            status => {
                let mut body = String::from_utf8_lossy(&response.body).into_owned();
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                Err(FetchError::Request { status, body })
            }
        }
    }
}
