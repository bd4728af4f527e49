//! Job execution errors.

use mqless_job::HandlerError;
use thiserror::Error;

/// Errors that may occur while running one of the bundled jobs.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job requires a payload")]
    MissingPayload,

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON {expected}, got {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

impl From<JobError> for HandlerError {
    fn from(err: JobError) -> Self {
        HandlerError::invalid_payload(err.to_string())
    }
}

/// Name of the JSON kind of `value`, used in error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
