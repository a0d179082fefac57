//! Application configuration with layered loading.
//!
//! Configuration is assembled from multiple sources via figment:
//!
//! 1. Environment variables (TRANSCACHE_*)
//! 2. TOML config file (if TRANSCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Retry tuning for the transcript fetch client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum total attempts per identifier (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Backoff multiplier per attempt (default: 2.0).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum computed backoff delay in milliseconds (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Rolling budget for total time spent retrying one identifier
    /// (default: 120000 ms).
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_budget_ms() -> u64 {
    120_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            budget_ms: default_budget_ms(),
        }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TRANSCACHE_*)
/// 2. TOML config file (if TRANSCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transcript API credential.
    ///
    /// Set via TRANSCACHE_API_KEY environment variable. Required only
    /// when a fetch is actually attempted; cache-only runs work without
    /// it.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Path to the registry JSON file.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Directory holding content artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Directory where distribution links are created.
    #[serde(default = "default_links_dir")]
    pub links_dir: PathBuf,

    /// Base URL of the transcript API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// oEmbed endpoint used for descriptive metadata.
    #[serde(default = "default_oembed_url")]
    pub oembed_url: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Content fetch timeout in milliseconds (default: 20000).
    #[serde(default = "default_transcript_timeout_ms")]
    pub transcript_timeout_ms: u64,

    /// Metadata fetch timeout in milliseconds (default: 5000).
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,

    /// Maximum accepted payload size in bytes (default: 10 MiB).
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Maximum resident entries in the acceleration cache (default: 1000).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Retry tuning.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./transcripts/registry.json")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./transcripts")
}

fn default_links_dir() -> PathBuf {
    PathBuf::from("./transcripts/links")
}

fn default_api_base_url() -> String {
    "https://api.transcriptor.app/v1".into()
}

fn default_oembed_url() -> String {
    "https://www.youtube.com/oembed".into()
}

fn default_user_agent() -> String {
    "transcache/0.1".into()
}

fn default_transcript_timeout_ms() -> u64 {
    20_000
}

fn default_metadata_timeout_ms() -> u64 {
    5_000
}

fn default_max_payload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_cache_capacity() -> usize {
    1_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            registry_path: default_registry_path(),
            artifacts_dir: default_artifacts_dir(),
            links_dir: default_links_dir(),
            api_base_url: default_api_base_url(),
            oembed_url: default_oembed_url(),
            user_agent: default_user_agent(),
            transcript_timeout_ms: default_transcript_timeout_ms(),
            metadata_timeout_ms: default_metadata_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            cache_capacity: default_cache_capacity(),
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Content fetch timeout as a Duration.
    pub fn transcript_timeout(&self) -> Duration {
        Duration::from_millis(self.transcript_timeout_ms)
    }

    /// Metadata fetch timeout as a Duration.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file cannot be read, the
    /// environment cannot be parsed, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TRANSCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TRANSCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check the API credential is available (deferred requirement).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the credential is not set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "api_key".into(),
            hint: "Set TRANSCACHE_API_KEY environment variable".into(),
        })
    }
}
