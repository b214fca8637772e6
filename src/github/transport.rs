//! HTTP transport boundary.
//!
//! All network I/O goes through [`HttpTransport`] so the API client can be
//! exercised against an in-memory transport in tests.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// HTTP headers as key/value pairs; lookups are case-insensitive.
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HttpHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("http transport error: {0}")]
    Other(String),
}

/// Transport for GET requests against the GitHub API.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// First header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Production transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.get(&request.url);
        for (k, v) in &request.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let headers: HttpHeaders = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Other(e.to_string())
                }
            })?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_get_is_case_insensitive() {
        let headers: HttpHeaders = vec![("X-RateLimit-Remaining".to_string(), "0".to_string())];
        assert_eq!(header_get(&headers, "x-ratelimit-remaining"), Some("0"));
        assert_eq!(header_get(&headers, "link"), None);
    }

    #[tokio::test]
    async fn test_mock_transport_serves_fifo_then_sticky() {
        let transport = MockTransport::new();
        transport.push_json("https://api.test/a", 202, json!({}));
        transport.always_json("https://api.test/a", 200, json!([1]));

        let req = HttpRequest {
            url: "https://api.test/a".to_string(),
            headers: Vec::new(),
        };
        let first = transport.get(req.clone()).await.unwrap();
        let second = transport.get(req.clone()).await.unwrap();
        let third = transport.get(req).await.unwrap();

        assert_eq!(first.status, 202);
        assert_eq!(second.status, 200);
        assert_eq!(third.status, 200);
        assert_eq!(transport.request_count("https://api.test/a"), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_unknown_route_errors() {
        let transport = MockTransport::new();
        let result = transport
            .get(HttpRequest {
                url: "https://api.test/missing".to_string(),
                headers: Vec::new(),
            })
            .await;
        assert!(result.is_err());
    }
}
