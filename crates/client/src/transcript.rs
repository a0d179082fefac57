//! Transcript service client.
//!
//! ### Contract
//!
//! - **Endpoint**: `GET {base_url}/transcript?video_id=<id>&url=<locator>`
//! - **Authentication**: `X-Api-Key` header; the credential is shape-checked
//!   at construction and never logged.
//! - **Classification**: 401/403 abort the run, 429 retries under the
//!   policy, every other failure skips the identifier.
//! - **Deduplication**: concurrent fetches for one identifier share a
//!   single execution.
//! - **Metadata**: oEmbed lookup with a shorter timeout; failures are the
//!   caller's to absorb into fallback values.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use transcache_core::AppConfig;

use crate::dedup::Inflight;
use crate::error::FetchError;
use crate::retry::{run_with_retry, RetryPolicy};

/// Upper bound on accepted credential length.
const MAX_CREDENTIAL_LEN: usize = 512;

/// Transcript client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API credential, supplied by the credential provider.
    pub api_key: String,
    /// Base URL of the transcript API.
    pub base_url: String,
    /// oEmbed endpoint for descriptive metadata.
    pub oembed_url: String,
    /// User-agent string.
    pub user_agent: String,
    /// Content fetch timeout.
    pub transcript_timeout: Duration,
    /// Metadata fetch timeout (shorter).
    pub metadata_timeout: Duration,
    /// Maximum accepted payload size in bytes.
    pub max_payload_bytes: usize,
    /// Retry tuning.
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Build a client configuration from the application config plus the
    /// resolved credential.
    pub fn from_app(config: &AppConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: config.api_base_url.clone(),
            oembed_url: config.oembed_url.clone(),
            user_agent: config.user_agent.clone(),
            transcript_timeout: config.transcript_timeout(),
            metadata_timeout: config.metadata_timeout(),
            max_payload_bytes: config.max_payload_bytes,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// Descriptive metadata for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub channel: String,
    pub title: String,
}

/// oEmbed response fields we care about.
#[derive(Debug, Deserialize)]
struct OembedResponse {
    author_name: Option<String>,
    title: Option<String>,
}

/// The seam the acquisition orchestrator depends on.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the transcript text for an identifier.
    async fn fetch_transcript(&self, id: &str, locator: &str) -> Result<String, FetchError>;

    /// Fetch channel and title for an identifier.
    async fn fetch_metadata(&self, id: &str, locator: &str) -> Result<VideoMetadata, FetchError>;
}

/// Transcript API client with retry and in-flight deduplication.
pub struct TranscriptClient {
    http: reqwest::Client,
    config: ClientConfig,
    inflight: Inflight<Result<String, FetchError>>,
}

impl TranscriptClient {
    /// Create a new client, validating the credential shape.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        if config.api_key.trim().is_empty() {
            return Err(FetchError::InvalidCredential("credential must not be empty".into()));
        }
        if config.api_key.len() > MAX_CREDENTIAL_LEN {
            return Err(FetchError::InvalidCredential(format!(
                "credential exceeds {MAX_CREDENTIAL_LEN} bytes"
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Network(std::sync::Arc::new(e)))?;

        Ok(Self { http, config, inflight: Inflight::new() })
    }

    /// Validate a locator before any call goes out.
    fn validate_locator(locator: &str) -> Result<Url, FetchError> {
        let url = Url::parse(locator)
            .map_err(|e| FetchError::InvalidRequest(format!("bad locator {locator:?}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::InvalidRequest(format!(
                "locator {locator:?} must be http(s)"
            )));
        }
        Ok(url)
    }

    /// One transcript fetch attempt, no retry.
    async fn attempt_transcript(&self, id: &str, locator: &str, attempt: u32) -> Result<String, FetchError> {
        let started = Instant::now();
        let endpoint = format!("{}/transcript", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&endpoint)
            .header("X-Api-Key", &self.config.api_key)
            .header("Accept", "text/plain")
            .query(&[("video_id", id), ("url", locator)])
            .timeout(self.config.transcript_timeout)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            id,
            attempt,
            endpoint = %endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transcript fetch attempt"
        );

        if status == 401 || status == 403 {
            return Err(FetchError::Unauthorized(format!("status {}", status.as_u16())));
        }
        if status == 429 {
            let retry_after = RetryPolicy::retry_after_delay(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(FetchError::RateLimited {
                reason: format!("status 429 for {id}"),
                retry_after,
            });
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError { status: status.as_u16() });
        }
        if status.is_client_error() {
            return Err(FetchError::InvalidRequest(format!("status {}", status.as_u16())));
        }

        let body = response.text().await?;
        self.validate_payload(&body)
    }

    /// Enforce the payload contract: non-empty after trim, under the cap.
    fn validate_payload(&self, body: &str) -> Result<String, FetchError> {
        if body.trim().is_empty() {
            return Err(FetchError::Validation("empty transcript payload".into()));
        }
        if body.len() > self.config.max_payload_bytes {
            return Err(FetchError::Validation(format!(
                "payload {} bytes exceeds {} byte cap",
                body.len(),
                self.config.max_payload_bytes
            )));
        }
        Ok(body.to_string())
    }
}

#[async_trait]
impl ContentFetcher for TranscriptClient {
    async fn fetch_transcript(&self, id: &str, locator: &str) -> Result<String, FetchError> {
        // Fail fast before joining or starting an in-flight call.
        Self::validate_locator(locator)?;

        self.inflight
            .run(id, || async move {
                run_with_retry(&self.config.retry, |attempt| {
                    self.attempt_transcript(id, locator, attempt)
                })
                .await
            })
            .await
    }

    async fn fetch_metadata(&self, id: &str, locator: &str) -> Result<VideoMetadata, FetchError> {
        let locator_url = Self::validate_locator(locator)?;
        let started = Instant::now();

        let response = self
            .http
            .get(&self.config.oembed_url)
            .header("Accept", "application/json")
            .query(&[("url", locator_url.as_str()), ("format", "json")])
            .timeout(self.config.metadata_timeout)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "metadata fetch"
        );

        if !status.is_success() {
            return Err(FetchError::InvalidRequest(format!(
                "oembed status {}",
                status.as_u16()
            )));
        }

        let oembed: OembedResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Validation(format!("bad oembed response: {e}")))?;

        match (oembed.author_name, oembed.title) {
            (Some(channel), Some(title)) if !channel.trim().is_empty() && !title.trim().is_empty() => {
                Ok(VideoMetadata { channel, title })
            }
            _ => Err(FetchError::Validation("oembed response missing channel or title".into())),
        }
    }
}
