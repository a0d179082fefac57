//! Configuration validation rules.
//!
//! Validation runs after loading from environment, file, or defaults;
//! it checks value ranges only, never availability of the credential
//! (that check is deferred to first use).

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Upper bound on accepted credential length.
const MAX_API_KEY_LEN: usize = 512;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_payload_bytes` is 0 or exceeds 50MB
    /// - either timeout is under 100ms or over 5 minutes
    /// - `cache_capacity` is 0
    /// - retry tuning is out of range
    /// - `user_agent` is empty
    /// - `api_key`, when present, is empty or over 512 bytes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_payload_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_payload_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "max_payload_bytes".into(),
                reason: "must not exceed 50MB".into(),
            });
        }

        for (field, ms) in [
            ("transcript_timeout_ms", self.transcript_timeout_ms),
            ("metadata_timeout_ms", self.metadata_timeout_ms),
        ] {
            if ms < 100 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must be at least 100ms".into(),
                });
            }
            if ms > 300_000 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > 10 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts".into(),
                reason: "must be between 1 and 10".into(),
            });
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: "retry.multiplier".into(),
                reason: "must be at least 1.0".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid {
                field: "user_agent".into(),
                reason: "must not be empty".into(),
            });
        }

        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "api_key".into(),
                    reason: "must not be empty".into(),
                });
            }
            if key.len() > MAX_API_KEY_LEN {
                return Err(ConfigError::Invalid {
                    field: "api_key".into(),
                    reason: "must not exceed 512 bytes".into(),
                });
            }
        }

        Ok(())
    }
}
