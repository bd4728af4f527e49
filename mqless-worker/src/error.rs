//! Errors returned by the worker runtime.

use mqless_job::{StoreError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("dispatch queue is closed")]
    QueueClosed,
}
