//! Retry with jittered exponential backoff.
//!
//! Transient store and network failures are retried a bounded number of
//! times; everything else surfaces immediately. Error types opt in by
//! implementing [`Retryable`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Classifies an error as worth retrying or not.
///
/// Only transient conditions (network blips, store throttling, mid-rotation
/// stale reads) should return `true`; configuration and authorization
/// failures must surface immediately.
pub trait Retryable {
    /// Returns `true` if the operation may succeed on a later attempt.
    fn is_transient(&self) -> bool;
}

/// A retry policy is invalid.
#[derive(Debug, Error)]
#[error("invalid retry policy: {reason}")]
pub struct InvalidRetryPolicy {
    reason: String,
}

/// Bounded exponential backoff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Backoff before the second attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Backoff multiplier per attempt (2.0 for exponential doubling).
    pub backoff_multiplier: f32,

    /// Upper bound on any single backoff.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(32),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries, for callers that handle failure inline.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Validates the policy parameters.
    pub fn validate(&self) -> Result<(), InvalidRetryPolicy> {
        if self.max_attempts == 0 {
            return Err(InvalidRetryPolicy {
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(InvalidRetryPolicy {
                reason: "backoff_multiplier must be at least 1.0".to_string(),
            });
        }
        if self.max_backoff < self.initial_backoff {
            return Err(InvalidRetryPolicy {
                reason: "max_backoff must not be smaller than initial_backoff".to_string(),
            });
        }
        Ok(())
    }

    /// Backoff before attempt `attempt + 2`, with ±10% jitter applied to
    /// spread out concurrent retriers.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base_ms = self.initial_backoff.as_millis() as f32;
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = base_ms * multiplier;

        let jitter = rand::rng().random_range(0.9..=1.1);
        let jittered_ms = (backoff_ms * jitter) as u64;

        Duration::from_millis(jittered_ms).min(self.max_backoff)
    }
}

/// Runs `f` until it succeeds, fails with a non-transient error, or the
/// policy's attempt budget is exhausted. The last error is returned as-is so
/// callers keep its type.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let backoff = policy.backoff_duration(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    error = %err,
                    "operation failed"
                );
                return Err(err);
            }
        }
    }
}
