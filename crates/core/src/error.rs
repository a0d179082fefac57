//! Unified error types for transcache.
//!
//! Every failure in the acquisition pipeline is classified into one of
//! these kinds; the batch driver decides per-kind whether to skip the
//! current identifier or abort the whole run.

/// Unified error type for the acquisition and caching engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The request was malformed (bad identifier, bad locator, 4xx).
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// The credential was rejected. Terminates the whole batch run.
    #[error("UNAUTHORIZED: {0}")]
    Unauthorized(String),

    /// The service asked us to slow down and the retry budget ran out.
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// The service failed on its side (5xx).
    #[error("SERVER_ERROR: {0}")]
    ServerError(String),

    /// An outbound call exceeded its timeout.
    #[error("TIMEOUT: {0}")]
    Timeout(String),

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("NETWORK: {0}")]
    Network(String),

    /// A payload or field violated a size/shape constraint.
    #[error("VALIDATION: {0}")]
    Validation(String),

    /// The registry file exists but cannot be parsed. Fatal.
    #[error("CORRUPTION: {0}")]
    Corruption(String),

    /// A parsed registry entry does not match the current schema. Fatal
    /// unless migration repairs the shape.
    #[error("SCHEMA_VIOLATION: {0}")]
    SchemaViolation(String),

    /// Disk I/O failed.
    #[error("FILESYSTEM: {0}")]
    Filesystem(String),

    /// The schema migration engine failed as a whole.
    #[error("MIGRATION: {0}")]
    Migration(String),
}

impl Error {
    /// Stable lowercase label used in per-identifier failure lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid-request",
            Error::Unauthorized(_) => "unauthorized",
            Error::RateLimited(_) => "rate-limited",
            Error::ServerError(_) => "server-error",
            Error::Timeout(_) => "timeout",
            Error::Network(_) => "network",
            Error::Validation(_) => "validation",
            Error::Corruption(_) => "corruption",
            Error::SchemaViolation(_) => "schema-violation",
            Error::Filesystem(_) => "filesystem",
            Error::Migration(_) => "migration",
        }
    }

    /// Whether this error terminates the whole run rather than one
    /// identifier.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Unauthorized(_) | Error::Corruption(_) | Error::SchemaViolation(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Filesystem(err.to_string())
    }
}
