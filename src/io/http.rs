use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;

use super::RangeTransport;
use crate::error::BoxError;

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for a whole request.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Attempts per request before giving up on timeouts and connect errors.
    pub max_retry: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retry: 10,
            user_agent: concat!("rangezip/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP Range transport for remote archives
pub struct HttpTransport {
    client: Client,
    url: String,
    max_retry: u32,
}

impl HttpTransport {
    pub fn new(url: String) -> Result<Self, BoxError> {
        Self::with_config(url, &HttpConfig::default())
    }

    pub fn with_config(url: String, config: &HttpConfig) -> Result<Self, BoxError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            url,
            max_retry: config.max_retry.max(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends the request built by `build`, retrying timeouts and connect
    /// errors with a linear backoff.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, BoxError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut retry_count = 0;
        loop {
            match build().send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(format!("max retries exceeded: {}", e).into());
                    }
                    log::warn!(
                        "connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl RangeTransport for HttpTransport {
    async fn content_length(&self) -> Result<u64, BoxError> {
        let resp = self.send_with_retry(|| self.client.head(&self.url)).await?;

        if !resp.status().is_success() {
            return Err(format!("HTTP request failed with status: {}", resp.status()).into());
        }

        let accept_ranges = resp
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        if !accept_ranges.contains("bytes") {
            log::warn!("server does not advertise byte ranges for {}", self.url);
        }

        resp.headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| "remote server did not return Content-Length".into())
    }

    async fn fetch_range(&self, start: u64, end: u64) -> Result<Vec<u8>, BoxError> {
        if start >= end {
            return Ok(Vec::new());
        }

        // HTTP ranges are inclusive
        let range = format!("bytes={}-{}", start, end - 1);
        let resp = self
            .send_with_retry(|| self.client.get(&self.url).header(header::RANGE, &range))
            .await?;

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(format!("HTTP request failed with status: {}", resp.status()).into());
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
