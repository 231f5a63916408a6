//! HTTP client shared by the registry client and the downloader.
//!
//! Wraps reqwest with the application user agent, connect/request timeouts
//! and tracking of the registry's `X-RateLimit-*` headers.

use crate::config::{AppConfig, NetworkConfig};
use crate::error::{DocconvError, Result};
use reqwest::{header, Client, Response};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
    /// Unix timestamp when the window resets.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// Seconds until the window resets, if it is in the future.
    pub fn seconds_until_reset(&self) -> Option<u64> {
        let reset = self.reset?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        (reset > now).then(|| reset - now)
    }
}

/// HTTP client with rate limit awareness.
pub struct HttpClient {
    client: Client,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    rate_limit_reset: AtomicU64,
}

impl HttpClient {
    /// Client for small API requests, bounded by [`NetworkConfig::REQUEST_TIMEOUT`].
    pub fn new() -> Result<Self> {
        Self::build(Some(NetworkConfig::REQUEST_TIMEOUT))
    }

    /// Client for large downloads: connect timeout only, no overall deadline.
    pub fn for_downloads() -> Result<Self> {
        Self::build(None)
    }

    fn build(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(AppConfig::USER_AGENT)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| DocconvError::Network {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            rate_limit_reset: AtomicU64::new(0),
        })
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        let reset = self.rate_limit_reset.load(Ordering::SeqCst);
        RateLimitState {
            remaining: (remaining >= 0).then_some(remaining as u64),
            limit: (limit > 0).then_some(limit),
            reset: (reset > 0).then_some(reset),
        }
    }

    /// Send a GET request.
    ///
    /// Transport failures become [`DocconvError::Network`]. Any HTTP status,
    /// including errors, is returned for the caller to interpret.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.send().await.map_err(|e| DocconvError::Network {
            message: format!("GET {} failed: {}", url, e),
        })?;

        self.update_rate_limits(&response);
        Ok(response)
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<i64>().ok())
        };

        if let Some(remaining) = parse("X-RateLimit-Remaining") {
            self.rate_limit_remaining.store(remaining, Ordering::SeqCst);
        }
        if let Some(limit) = parse("X-RateLimit-Limit") {
            self.rate_limit_limit.store(limit.max(0) as u64, Ordering::SeqCst);
        }
        if let Some(reset) = parse("X-RateLimit-Reset") {
            self.rate_limit_reset.store(reset.max(0) as u64, Ordering::SeqCst);
        }

        let state = self.rate_limit_state();
        if let (Some(remaining), Some(limit)) = (state.remaining, state.limit) {
            debug!("Rate limit: {}/{}", remaining, limit);
        }
    }
}

/// `Retry-After` header value in seconds, if present and numeric.
pub fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Host part of a URL, used to label mirrors in logs.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_until_reset() {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let state = RateLimitState {
            remaining: Some(0),
            limit: Some(60),
            reset: Some(now + 120),
        };
        let secs = state.seconds_until_reset().unwrap();
        assert!(secs > 100 && secs <= 120);

        let past = RateLimitState {
            reset: Some(now.saturating_sub(10)),
            ..Default::default()
        };
        assert_eq!(past.seconds_until_reset(), None);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://api.github.com/repos/jgm/pandoc"),
            "api.github.com"
        );
        assert_eq!(extract_domain("not a url"), "unknown");
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.rate_limit_state(), RateLimitState::default());
        assert!(HttpClient::for_downloads().is_ok());
    }
}
