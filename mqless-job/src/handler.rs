//! Handler traits for job execution.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::error::HandlerError;

/// Executes jobs of one job type.
///
/// The payload is the opaque blob stored with the job; `None` when the job was enqueued
/// without one.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, payload: Option<&[u8]>) -> Result<(), HandlerError>;
}

/// Receives the error of a failed handler. Invoked at most once per job, for notification only.
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, error: &HandlerError);
}

/// Adapter turning an async closure into a [`JobHandler`]. See [`handler_fn`].
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Build a [`JobHandler`] from a closure taking an owned copy of the payload.
///
/// ```rust
/// use mqless_job::{handler_fn, HandlerError};
///
/// let handler = handler_fn(|payload: Option<Vec<u8>>| async move {
///     match payload {
///         Some(_) => Ok(()),
///         None => Err(HandlerError::invalid_payload("payload required")),
///     }
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Option<Vec<u8>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Option<Vec<u8>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn execute(&self, payload: Option<&[u8]>) -> Result<(), HandlerError> {
        (self.f)(payload.map(<[u8]>::to_vec)).await
    }
}

/// Adapter turning a closure into an [`ErrorHandler`]. See [`error_handler_fn`].
#[derive(Clone)]
pub struct FnErrorHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnErrorHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnErrorHandler").finish_non_exhaustive()
    }
}

pub fn error_handler_fn<F>(f: F) -> FnErrorHandler<F>
where
    F: Fn(&HandlerError) + Send + Sync,
{
    FnErrorHandler { f }
}

impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(&HandlerError) + Send + Sync,
{
    fn on_error(&self, error: &HandlerError) {
        (self.f)(error)
    }
}

/// A handler that accepts every job.
///
/// Useful for tests or as a placeholder while the real implementation is being written.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

#[async_trait]
impl JobHandler for NoOpHandler {
    async fn execute(&self, _payload: Option<&[u8]>) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// An error handler that ignores the error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpErrorHandler;

impl ErrorHandler for NoOpErrorHandler {
    fn on_error(&self, _error: &HandlerError) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn closure_handler_sees_payload() {
        let handler = handler_fn(|payload: Option<Vec<u8>>| async move {
            if payload.as_deref() == Some(b"[]".as_slice()) {
                Ok(())
            } else {
                Err(HandlerError::failed("unexpected payload"))
            }
        });
        assert!(handler.execute(Some(b"[]".as_slice())).await.is_ok());
        assert_eq!(
            handler.execute(None).await,
            Err(HandlerError::failed("unexpected payload"))
        );
    }

    #[test]
    fn closure_error_handler_is_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let eh = error_handler_fn(move |err: &HandlerError| {
            assert_eq!(err.to_string(), "intended-error");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        eh.on_error(&HandlerError::failed("intended-error"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn noop_handler_succeeds() {
        assert!(NoOpHandler.execute(None).await.is_ok());
        NoOpErrorHandler.on_error(&HandlerError::failed("ignored"));
    }
}
