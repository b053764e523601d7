//! Bounded retry for transient store failures.
//!
//! Only `StoreError::Unavailable` is retried, and only on writes that carry
//! an idempotency key, so a retry after an ambiguous failure can never
//! duplicate a document.

use std::future::Future;
use std::time::Duration;

use tally_shared::config::RetryConfig;
use tally_store::StoreError;

/// Runs `op` up to `policy.max_attempts` times, sleeping
/// `backoff_ms * attempt` between retryable failures.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    op_name: &'static str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    error = %err,
                    op = op_name,
                    attempt,
                    "retrying transient store failure"
                );
                tokio::time::sleep(Duration::from_millis(
                    policy.backoff_ms * u64::from(attempt),
                ))
                .await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
