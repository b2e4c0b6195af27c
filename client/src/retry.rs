//! Retry with exponential backoff for idempotent ledger reads.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::config::RetryPolicy;
use crate::error::{ClientError, Result};

/// Runs `operation`, retrying transient failures per `policy`.
///
/// Errors for which [`ClientError::is_retryable`] is false are returned
/// immediately. Only use this for operations that are safe to repeat.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    // backon counts retries, not attempts
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let backoff = ExponentialBuilder::default()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries)
        .with_jitter();

    operation
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(ClientError::is_retryable)
        .notify(|err: &ClientError, dur: Duration| {
            tracing::warn!(
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "retrying ledger read"
            );
        })
        .await
}
