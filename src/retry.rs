//! Retry logic for transient metadata-service failures
//!
//! The spec-level contract is "zero or one immediate retry": retries are a
//! performance optimization against a rate-limited service, never a
//! correctness requirement. The defaults in [`RetryConfig`] encode exactly
//! that (one attempt, no delay), while backoff and jitter remain available
//! as configuration knobs.

use crate::config::RetryConfig;
use crate::error::TaskError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, rate-limit signals) should return
/// `true`. Permanent failures (malformed responses, client errors) should
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TaskError {
    fn is_retryable(&self) -> bool {
        match self {
            // Network-level failures are worth one more attempt
            TaskError::Transport(_) => true,
            // 429/503 are explicit back-off signals; other statuses are permanent
            TaskError::Service { .. } => self.is_rate_limit(),
            // A malformed body will be malformed again
            TaskError::Parse { .. } => false,
        }
    }
}

/// Execute an async operation, retrying transient failures per `config`.
///
/// Returns the successful result or the last error once attempts are
/// exhausted. With `max_attempts = 0` the operation runs exactly once.
pub async fn call_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "transient failure, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                if !jittered_delay.is_zero() {
                    tokio::time::sleep(jittered_delay).await;
                }

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay falls between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
