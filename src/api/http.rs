use crate::error::SourceError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const MAX_BODY_IN_ERROR: usize = 200;

// Type alias for the rate limiter to simplify signatures
type ExchangeRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate-limited HTTP access to one exchange's public REST API
///
/// Every request carries the client timeout. No retries happen here; a failed
/// request is reported as `SourceUnavailable` and the resolver moves on.
#[derive(Clone)]
pub struct HttpSource {
    exchange: String,
    base_url: String,
    client: Client,
    timeout: Duration,
    rate_limiter: Arc<ExchangeRateLimiter>,
}

impl HttpSource {
    pub fn new(
        exchange: &str,
        base_url: &str,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("signalbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(rpm);

        Ok(Self {
            exchange: exchange.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// GET `path` with `query` and decode the body as `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(exchange = %self.exchange, %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(self.unavailable(format!(
                "HTTP {}: {}",
                status,
                truncate(&body, MAX_BODY_IN_ERROR)
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| self.unavailable(format!("malformed response: {}", e)))
    }

    pub fn unavailable(&self, reason: impl Into<String>) -> SourceError {
        SourceError::unavailable(&self.exchange, reason)
    }

    fn request_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            self.unavailable(format!("timeout after {}s", self.timeout.as_secs()))
        } else {
            self.unavailable(format!("network error: {}", e))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

/// Parse a decimal price string as returned by exchange REST APIs
pub fn parse_price(field: &str, raw: &str) -> std::result::Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("{} is not a number: {:?}", field, raw))
}

pub fn parse_millis(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| format!("invalid millisecond timestamp: {:?}", raw))
}

pub fn parse_seconds(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| format!("invalid second timestamp: {:?}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Ping {
        ok: bool,
    }

    fn source(url: &str) -> HttpSource {
        HttpSource::new("testex", url, Duration::from_secs(2), 600).unwrap()
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_price("close", "64123.5"), Ok(64123.5));
        assert!(parse_price("close", "abc").is_err());
        assert_eq!(
            parse_millis("1700000000000").unwrap().timestamp(),
            1_700_000_000
        );
        assert_eq!(parse_seconds("1700000000").unwrap().timestamp(), 1_700_000_000);
        assert!(parse_seconds("x").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let ping: Ping = source(&server.url()).get_json("/ping", &[]).await.unwrap();

        assert!(ping.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_http_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ping")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = source(&server.url())
            .get_json::<Ping>("/ping", &[])
            .await
            .unwrap_err();

        match err {
            SourceError::SourceUnavailable { exchange, reason } => {
                assert_eq!(exchange, "testex");
                assert!(reason.contains("503"));
                assert!(reason.contains("maintenance"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_json_malformed_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = source(&server.url())
            .get_json::<Ping>("/ping", &[])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("malformed response"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to be listening
        let err = source("http://127.0.0.1:9")
            .get_json::<Ping>("/ping", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_unavailable() {
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ping")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(1500));
                w.write_all(br#"{"ok":true}"#)
            })
            .create_async()
            .await;

        let slow = HttpSource::new("testex", &server.url(), Duration::from_secs(1), 600).unwrap();
        let err = slow.get_json::<Ping>("/ping", &[]).await.unwrap_err();

        match err {
            SourceError::SourceUnavailable { exchange, reason } => {
                assert_eq!(exchange, "testex");
                assert_eq!(reason, "timeout after 1s");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
