//! Retry policy for rate-limited fetches.
//!
//! Only the rate-limited failure kind retries, bounded by a maximum
//! attempt count and a rolling time budget. The delay comes from the
//! service's retry-after hint when it supplies a usable one, otherwise
//! from exponential backoff with jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use transcache_core::config::RetryConfig;

use crate::error::FetchError;

/// Cap applied to service-supplied retry-after hints.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Floor applied to every computed delay.
pub const MIN_DELAY: Duration = Duration::from_secs(1);

/// Retry tuning derived from configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum total attempts (first try included).
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Rolling cap on total time spent retrying one identifier.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            budget: Duration::from_millis(config.budget_ms),
        }
    }

    /// Exponential backoff for a 1-based attempt number.
    ///
    /// `min(max_delay, initial × multiplier^(attempt-1))` with ±25%
    /// jitter, floored at one second.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_secs_f64((capped * jitter).max(MIN_DELAY.as_secs_f64()))
    }

    /// Validate and cap a service-supplied retry-after hint (seconds).
    ///
    /// Missing, negative, or non-numeric hints are rejected so the
    /// caller falls back to computed backoff.
    pub fn retry_after_delay(hint: Option<&str>) -> Option<Duration> {
        let secs: i64 = hint?.trim().parse().ok()?;
        if secs < 0 {
            return None;
        }
        Some(Duration::from_secs(secs as u64).min(MAX_RETRY_AFTER))
    }
}

/// Drive `op` under the retry policy.
///
/// `op` receives the 1-based attempt number. Rate-limited failures sleep
/// and retry until the attempt bound or the rolling budget is reached;
/// exceeding the budget fails as rate-limited rather than sleeping on.
/// Every other failure kind is returned immediately.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(FetchError::RateLimited { reason, retry_after }) => {
                if attempt >= policy.max_attempts {
                    return Err(FetchError::RateLimited {
                        reason: format!("{reason} (after {attempt} attempts)"),
                        retry_after: None,
                    });
                }

                let delay = retry_after.unwrap_or_else(|| policy.backoff_delay(attempt));
                if started.elapsed() + delay > policy.budget {
                    return Err(FetchError::RateLimited {
                        reason: format!("retry budget exhausted after {attempt} attempts"),
                        retry_after: None,
                    });
                }

                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}
