//! Retry utilities for resilient operations
//!
//! This module provides the retry mechanism used at the page-load and
//! navigation boundaries: a fixed or exponential base delay plus a random
//! jitter between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (first try included)
    pub max_attempts: u32,

    /// Base delay in milliseconds before the second attempt
    pub base_delay_ms: u64,

    /// Maximum base delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff (1.0 keeps the base delay fixed)
    pub backoff_multiplier: f64,

    /// Random jitter added on top of the base delay, inclusive range in ms
    pub jitter_ms: (u64, u64),
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_ms: (0, 0),
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with custom attempt count
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Fixed base delay plus uniform jitter, e.g. "5s plus 5-10s"
    pub fn fixed_with_jitter(max_attempts: u32, base_delay_ms: u64, jitter_ms: (u64, u64)) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: base_delay_ms,
            backoff_multiplier: 1.0,
            jitter_ms,
        }
    }

    /// Base delay for a given attempt (0-based), without jitter
    fn base_delay(&self, attempt: u32) -> Duration {
        let delay_ms = if attempt == 0 {
            0
        } else {
            let exponential =
                self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }

    /// Delay before a given attempt, jitter included
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if attempt == 0 {
            return base;
        }

        let (lo, hi) = self.jitter_ms;
        let jitter = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        base + Duration::from_millis(jitter)
    }
}

/// Execute an operation with retry logic and backoff
///
/// Returns `Ok(T)` on success, or the last error once `max_attempts` is spent.
///
/// # Example
///
/// ```no_run
/// use offerhound::utils::retry::{with_retry, RetryConfig};
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let config = RetryConfig::fixed_with_jitter(3, 5_000, (5_000, 10_000));
/// let value = with_retry(&config, "load listing", || async {
///     Ok::<_, std::io::Error>(42)
/// })
/// .await
/// .map_err(|(e, _)| e)?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the last error together with the number of attempts made.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, (E, u32)>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_if(config, label, &mut operation, |_| true).await
}

/// Execute an operation with retry logic, using a custom retry predicate
///
/// Errors rejected by `should_retry` are returned immediately.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, (E, u32)>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for(attempt);
            debug!(
                operation = label,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(operation = label, attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                attempt += 1;
                if !should_retry(&e) {
                    warn!(operation = label, error = %e, "Non-retryable error encountered");
                    return Err((e, attempt));
                }

                warn!(
                    operation = label,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Operation failed"
                );

                if attempt >= attempts {
                    return Err((e, attempt));
                }
            }
        }
    }
}
