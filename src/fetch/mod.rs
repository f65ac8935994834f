//! HTTP transport for the APOD site.
//!
//! Thin wrapper around a reqwest client. The only policy it carries is
//! distinguishing "page does not exist" (404) from other failures, because
//! the traversal layer treats a missing day as a normal outcome of walking
//! forward past the newest page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {url}")]
    NotFound { url: Url },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

impl FetchError {
    /// Whether this error means the page simply does not exist upstream.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("apod/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Narrow transport interface consumed by the traversal layer.
///
/// The real implementation is [`PageFetcher`]; tests substitute canned
/// page sources.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch a URL and return the body as text.
    async fn get_text(&self, url: &Url) -> Result<String, FetchError>;

    /// Fetch a URL and return the raw body bytes, unparsed.
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Sequential page fetcher: one request at a time, no retries.
///
/// Retry and backoff policy, if ever wanted, belongs here and not in the
/// traversal code that calls this.
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("apod")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Create a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetcherConfig::default())
    }

    async fn checked_get(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { url: url.clone() });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.checked_get(url).await?;
        Ok(response.text().await?)
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self.checked_get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
