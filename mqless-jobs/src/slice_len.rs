//! `slice-len` job implementation.

use mqless_job::{async_trait, HandlerError, JobHandler};
use serde_json::Value;
use tracing::info;

use crate::error::{json_kind, JobError};

/// Handler for `slice-len` jobs.
///
/// The payload must be a JSON array. The job logs the number of elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct SliceLenHandler;

impl SliceLenHandler {
    pub fn new() -> Self {
        Self
    }

    fn len_of(payload: Option<&[u8]>) -> Result<usize, JobError> {
        let bytes = payload.ok_or(JobError::MissingPayload)?;
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Array(items) => Ok(items.len()),
            other => Err(JobError::UnexpectedShape {
                expected: "array",
                found: json_kind(&other),
            }),
        }
    }
}

#[async_trait]
impl JobHandler for SliceLenHandler {
    async fn execute(&self, payload: Option<&[u8]>) -> Result<(), HandlerError> {
        let len = Self::len_of(payload)?;
        info!(len, "slice-len job completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_array_elements() {
        let handler = SliceLenHandler::new();
        assert!(handler.execute(Some(b"[]".as_slice())).await.is_ok());
        assert_eq!(SliceLenHandler::len_of(Some(b"[1, 2, 3]".as_slice())).unwrap(), 3);
    }

    #[tokio::test]
    async fn rejects_objects() {
        let err = SliceLenHandler::new()
            .execute(Some(br#"{"msg":"message-2"}"#.as_slice()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HandlerError::invalid_payload("expected a JSON array, got object")
        );
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed_payloads() {
        let handler = SliceLenHandler::new();
        assert!(matches!(
            handler.execute(None).await,
            Err(HandlerError::InvalidPayload(_))
        ));
        assert!(matches!(
            handler.execute(Some(b"[1,".as_slice())).await,
            Err(HandlerError::InvalidPayload(_))
        ));
    }
}
