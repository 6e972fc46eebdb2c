//! Retry wrapper for transient upstream failures.

use std::time::Duration;

use tracing::warn;

use crate::ai::AiError;
use crate::constants::{RETRY_BASE_DELAY, RETRY_MAX_ATTEMPTS};

/// Bounds for [`with_backoff`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on calls, first attempt included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay: RETRY_BASE_DELAY,
        }
    }
}

/// Delay applied after `failed_attempts` transient failures (1-based).
fn backoff_delay(policy: RetryPolicy, failed_attempts: u32) -> Duration {
    policy.base_delay * 2u32.saturating_pow(failed_attempts.saturating_sub(1))
}

/// Runs `operation`, retrying transient failures with exponential backoff.
///
/// Non-transient errors propagate immediately without sleeping. A run of
/// transient failures makes at most `policy.max_attempts` calls before the
/// last error is surfaced.
pub async fn with_backoff<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut failed_attempts = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                failed_attempts += 1;
                if !err.is_transient() || failed_attempts >= policy.max_attempts {
                    return Err(err);
                }
                let delay = backoff_delay(policy, failed_attempts);
                warn!(
                    "transient failure (attempt {failed_attempts}/{}), retrying in {delay:?}: {err}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
