//! Fetch client error types.
//!
//! Clonable by design: deduplicated in-flight calls hand the same result
//! to every waiter, so transport errors are wrapped in `Arc`.

use std::sync::Arc;
use std::time::Duration;

/// Classified failure from the transcript fetch client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Malformed identifier, locator, or request (4xx other than auth
    /// and rate limiting). Skip this identifier.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Credential rejected (401/403). Aborts the whole run.
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// Service asked us to back off (429). The only retryable kind.
    #[error("rate limited: {reason}")]
    RateLimited {
        reason: String,
        /// Service-supplied retry hint, already validated and capped.
        retry_after: Option<Duration>,
    },

    /// 5xx from the service. Not retried.
    #[error("server error: status {status}")]
    ServerError { status: u16 },

    /// Request exceeded its timeout.
    #[error("request timeout")]
    Timeout,

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Payload violated a size/shape constraint (empty, oversized).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Credential failed the shape check (empty or oversized).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout } else { FetchError::Network(Arc::new(err)) }
    }
}

impl From<FetchError> for transcache_core::Error {
    fn from(err: FetchError) -> Self {
        use transcache_core::Error;
        match &err {
            FetchError::InvalidRequest(msg) => Error::InvalidRequest(msg.clone()),
            FetchError::Unauthorized(msg) => Error::Unauthorized(msg.clone()),
            FetchError::RateLimited { reason, .. } => Error::RateLimited(reason.clone()),
            FetchError::ServerError { status } => Error::ServerError(format!("status {status}")),
            FetchError::Timeout => Error::Timeout("request timeout".into()),
            FetchError::Network(e) => Error::Network(e.to_string()),
            FetchError::Validation(msg) => Error::Validation(msg.clone()),
            FetchError::InvalidCredential(msg) => Error::Validation(msg.clone()),
        }
    }
}
