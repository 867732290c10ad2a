use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use super::encoding::{self, DecodeError};
use super::parser::{parse_feed, Entry};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching and parsing a feed.
///
/// `Network`, `HttpStatus`, `Timeout`, `RateLimited`, `ResponseTooLarge` and
/// `IncompleteResponse` are network-level failures; `Decode` and `Parse` mean
/// the bytes arrived but are not a usable feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body could not be decoded to text
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    /// Feed text is not valid RSS/Atom/JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Anything that can produce the current entries of a feed URL.
///
/// [`FeedFetcher`] is the network implementation; snapshotting accepts any
/// source so it can be driven without HTTP.
pub trait EntrySource {
    fn fetch_entries(&self, url: &str) -> impl Future<Output = Result<Vec<Entry>, FetchError>> + Send;
}

/// Fetches feed documents over HTTP and parses them into entries.
///
/// Every call goes to the network; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl FeedFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: Self::DEFAULT_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay for exponential backoff (delay, 2×delay, 4×delay, ...).
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Fetch `url`, decode the body and parse it as a feed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection or TLS errors
    /// - [`FetchError::Timeout`] - Request exceeded the configured timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::RateLimited`] - 429 response after max retries
    /// - [`FetchError::ResponseTooLarge`] - Response exceeded 10MB
    /// - [`FetchError::Decode`] - Unknown or inconsistent character encoding
    /// - [`FetchError::Parse`] - Malformed feed
    ///
    /// # Retries
    ///
    /// HTTP 429, 5xx and truncated bodies are retried with exponential
    /// backoff up to `max_retries` times. 4xx responses fail immediately.
    pub async fn fetch_entries(&self, url: &str) -> Result<Vec<Entry>, FetchError> {
        tracing::info!(feed = %url, "Retrieving entries");

        let (bytes, content_type) = self.fetch_bytes(url).await?;
        let text = encoding::decode(&bytes, content_type.as_deref())?;

        let entries = parse_feed(&text).map_err(|e| {
            tracing::warn!(feed = %url, error = %e, "Error parsing feed");
            FetchError::Parse(e.to_string())
        })?;

        tracing::info!(feed = %url, count = entries.len(), "Retrieved entries");
        Ok(entries)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), FetchError> {
        let mut retry_count = 0;

        loop {
            let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.max_retries {
                    return Err(FetchError::RateLimited(self.max_retries));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    feed = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    feed = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            match tokio::time::timeout(self.timeout, read_limited_bytes(response, MAX_FEED_SIZE))
                .await
                .map_err(|_| FetchError::Timeout)?
            {
                Ok(bytes) => return Ok((bytes, content_type)),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        feed = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(retry_count))
    }
}

impl EntrySource for FeedFetcher {
    fn fetch_entries(&self, url: &str) -> impl Future<Output = Result<Vec<Entry>, FetchError>> + Send {
        FeedFetcher::fetch_entries(self, url)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
