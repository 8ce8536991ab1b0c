//! Bounded retry for transient failures
//!
//! CAS races and transient store errors retry up to three times with
//! exponential backoff and jitter; everything else surfaces immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use hlekkr_core::PipelineError;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 50;

/// Run `operation` with bounded retry on retryable errors.
pub async fn retry_with_backoff<T, F, Fut>(mut operation: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                attempt += 1;
                let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                let jitter = rand::rng().random_range(0..=base / 2);
                let delay = Duration::from_millis(base + jitter);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_conflicts() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PipelineError::conflict("cas race"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let result: Result<(), _> =
            retry_with_backoff(|| async { Err(PipelineError::conflict("always")) }).await;
        assert!(matches!(result, Err(PipelineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(PipelineError::input_invalid("bad input")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
