//! Deadline enforcement for model invocations
//!
//! Every inference call is a suspension point with a hard deadline; a hung
//! backend becomes a `DeadlineExceeded` the ensemble can absorb as a
//! synthesized neutral result.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::invoker::{ModelError, ModelInvoker, ModelRequest, ModelResponse};

/// Default model invocation deadline
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Wraps any invoker with a per-call deadline and failure counters.
#[derive(Debug)]
pub struct TimedInvoker<I: ModelInvoker> {
    inner: Arc<I>,
    deadline: Duration,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_timeouts: AtomicU64,
}

impl<I: ModelInvoker> TimedInvoker<I> {
    pub fn new(inner: I, deadline: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            deadline,
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
        }
    }

    /// Wrap with the 120s default deadline
    pub fn wrap(inner: I) -> Self {
        Self::new(inner, DEFAULT_DEADLINE)
    }

    /// (calls, failures, timeouts)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.total_calls.load(Ordering::Relaxed),
            self.total_failures.load(Ordering::Relaxed),
            self.total_timeouts.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl<I: ModelInvoker + 'static> ModelInvoker for TimedInvoker<I> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let model_id = request.model_id.clone();

        match tokio::time::timeout(self.deadline, self.inner.invoke(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
            Err(_) => {
                self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(model_id = %model_id, deadline_secs = self.deadline.as_secs(), "model invocation deadline exceeded");
                Err(ModelError::DeadlineExceeded(self.deadline.as_secs()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInvoker;

    #[derive(Debug)]
    struct HangingInvoker;

    #[async_trait]
    impl ModelInvoker for HangingInvoker {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn invoke(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_passes_through() {
        let timed = TimedInvoker::wrap(MockInvoker::constant("{\"confidence\": 0.5, \"techniques\": [], \"certainty\": \"medium\"}"));
        let result = timed
            .invoke(ModelRequest::new("m1", "fast-v1", "", "image/png", "p"))
            .await;
        assert!(result.is_ok());
        assert_eq!(timed.stats().0, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let timed = TimedInvoker::new(HangingInvoker, Duration::from_secs(1));
        let result = timed
            .invoke(ModelRequest::new("m1", "fast-v1", "", "image/png", "p"))
            .await;
        assert!(matches!(result, Err(ModelError::DeadlineExceeded(1))));
        assert_eq!(timed.stats().2, 1);
    }
}
