//! `print-msg` job implementation.

use mqless_job::{async_trait, HandlerError, JobHandler};
use serde::Deserialize;
use tracing::info;

use crate::error::JobError;

/// Payload for the print-msg job.
#[derive(Debug, Deserialize)]
pub struct PrintMsgPayload {
    pub msg: String,
}

/// Handler for `print-msg` jobs. Logs the `msg` field of the payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintMsgHandler;

impl PrintMsgHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for PrintMsgHandler {
    async fn execute(&self, payload: Option<&[u8]>) -> Result<(), HandlerError> {
        let bytes = payload.ok_or(JobError::MissingPayload)?;
        let parsed: PrintMsgPayload = serde_json::from_slice(bytes).map_err(JobError::from)?;

        info!(msg = %parsed.msg, "print-msg job completed");
        Ok(())
    }
}
