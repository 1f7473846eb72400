//! Request-scoped context: deadline, cancellation and a request id.
//!
//! One `Context` is created per stow request by the front-end and threaded
//! through every orchestrator, registry and signer call. Nothing at this
//! layer retries.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StowError};

/// Deadline the reference front-ends bind to a whole Copy+Sign request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct Context {
    request_id: String,
    deadline: Option<(Instant, Duration)>,
    cancel: CancellationToken,
}

impl Context {
    /// A context with no deadline and a fresh request id.
    pub fn background() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        let mut ctx = Self::background();
        ctx.deadline = Some((Instant::now() + timeout, timeout));
        ctx
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.map(|(at, _)| at)
    }

    /// A context cancelled together with this one, sharing its deadline.
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. The in-flight future is dropped on either.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(StowError::Cancelled {
                operation: operation.to_string(),
            });
        }

        match self.deadline {
            Some((at, duration)) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(StowError::Cancelled {
                        operation: operation.to_string(),
                    }),
                    res = tokio::time::timeout_at(at, fut) => match res {
                        Ok(inner) => inner,
                        Err(_) => {
                            tracing::debug!(operation, ?duration, "Deadline exceeded");
                            Err(StowError::Timeout {
                                operation: operation.to_string(),
                                duration,
                            })
                        }
                    },
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(StowError::Cancelled {
                        operation: operation.to_string(),
                    }),
                    res = fut => res,
                }
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = Context::background();
        let value = ctx.run("add", async { Ok(1 + 1) }).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_run_passes_error_through() {
        let ctx = Context::with_timeout(Duration::from_secs(5));
        let err = ctx
            .run::<(), _>("fail", async { Err(StowError::Signing("boom".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, StowError::Signing(_)));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = Context::with_timeout(Duration::from_millis(10));
        let err = ctx
            .run("slow pull", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        match err {
            StowError::Timeout { operation, duration } => {
                assert_eq!(operation, "slow pull");
                assert_eq!(duration, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let ctx = Context::background();
        ctx.cancel();
        let err = ctx.run("push", async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, StowError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight() {
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let err = ctx
            .run("push", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StowError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_child_follows_parent_cancel() {
        let parent = Context::background().with_request_id("req-1");
        let child = parent.child();
        assert_eq!(child.request_id(), "req-1");
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let parent = Context::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_with_timeout_sets_deadline() {
        let ctx = Context::with_timeout(DEFAULT_REQUEST_TIMEOUT);
        assert!(ctx.deadline().is_some());
        assert!(Context::background().deadline().is_none());
    }
}
