//! Coverage download manager with retry logic.
//!
//! Key features:
//! - Response bodies are buffered per attempt, so no two items share state
//! - Exponential backoff retry on transport failures
//! - A body cut short mid-stream is discarded, never handed to the decoder

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{Client, Response};
use tracing::{debug, instrument, warn};

use catalog::Purpose;
use scene_common::{SceneError, SceneResult};

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(1800), // 30 minutes
        }
    }
}

/// Fetches coverage responses over a shared HTTP client.
pub struct DownloadManager {
    client: Client,
    config: DownloadConfig,
}

impl DownloadManager {
    /// Create a new download manager with the given configuration.
    pub fn new(config: DownloadConfig) -> SceneResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SceneError::download("client", format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `url` and return the response body.
    ///
    /// Only [`SceneError::Download`] failures are retried.
    #[instrument(skip(self, url), fields(id = %id, purpose = %purpose))]
    pub async fn fetch(&self, id: &str, purpose: Purpose, url: &str) -> SceneResult<Bytes> {
        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.fetch_once(id, url).await {
                Ok(bytes) => {
                    metrics::counter!("scene_bytes_downloaded_total").increment(bytes.len() as u64);
                    debug!(bytes = bytes.len(), "Download completed");
                    return Ok(bytes);
                }
                Err(e) if e.is_retryable() && retry_count < self.config.max_retries => {
                    retry_count += 1;
                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs(),
                        "Download failed, retrying"
                    );

                    // Wait before retry
                    tokio::time::sleep(delay).await;

                    // Exponential backoff
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, id: &str, url: &str) -> SceneResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SceneError::download(id, describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SceneError::download(id, format!("HTTP error: {}", status)));
        }

        read_body(id, response).await
    }
}

/// Collect the response body chunk by chunk.
async fn read_body(id: &str, response: Response) -> SceneResult<Bytes> {
    let capacity = response.content_length().unwrap_or(0) as usize;
    let mut body = BytesMut::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SceneError::download(id, describe(&e)))?;
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("request failed: {}", err)
    }
}
