// src/llm/retry.rs
// Bounded exponential backoff around the adapter network call
//
// Wraps exactly one thing: `LlmAdapter::send`. Hook execution, validation,
// and persistence retry at their own granularity (or not at all).

use std::time::Duration;
use tracing::warn;

use super::LlmError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_BACKOFF_CAP_SECS: u64 = 8;

/// Retry policy for transient provider failures.
///
/// Attempt 1 runs immediately. After a retryable failure the policy sleeps
/// `min(cap, base * 2^(attempt-1))`, scaled by jitter, then tries again, up
/// to `max_attempts` total attempts. Non-retryable failures and exhaustion
/// propagate the last error unchanged.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
            cap: Duration::from_secs(DEFAULT_BACKOFF_CAP_SECS),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt bound and the default backoff curve
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, without jitter
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        exp.min(self.cap)
    }

    /// Run `op` under this policy.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = jittered(self.backoff_for(attempt));
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Transient provider failure, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Scale a delay into [0.5, 1.0) of its nominal value so concurrent callers
/// don't thunder back in lockstep.
fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(0.5 + rand::random::<f64>() * 0.5)
}
