//! Error types for the job processor.

use thiserror::Error;

/// Errors surfaced by a [`JobStore`](crate::JobStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store is unavailable: {0}")]
    Unavailable(String),

    #[error("job store query failed: {0}")]
    Query(String),

    #[error("job payload cannot be stored: {0}")]
    Encoding(String),

    #[error("invalid job table name '{0}'")]
    InvalidTableName(String),

    #[error("stored job is corrupt: {0}")]
    Corrupt(String),
}

/// Bad arguments passed while registering handlers or building configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty string job type is not allowed")]
    EmptyJobType,

    #[error("a handler is required for job type '{0}'")]
    MissingHandler(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reason a claimed job was routed to `Error` without being executed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("handler of '{0}' is not registered")]
    UnregisteredJobType(String),

    #[error("error handler of '{0}' is not registered")]
    MissingErrorHandler(String),
}

/// Failure returned by a user supplied job handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    #[inline]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}
