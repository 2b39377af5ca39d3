//! Bounded retry with exponential backoff
//!
//! Only transient failures are retried; the delay before retry `n` is
//! `base_delay_ms * 2^(n-1)`.

use std::future::Future;

use wdlink_core::RetryConfig;

use crate::RequestError;

/// Run `attempt` until it succeeds, fails permanently, or retries run out.
pub(crate) async fn retry_request<T, F, Fut>(
    policy: &RetryConfig,
    operation: &str,
    mut attempt: F,
) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut retries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for_attempt(retries);
                tracing::warn!(
                    operation,
                    retry = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
