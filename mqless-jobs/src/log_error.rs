use mqless_job::{ErrorHandler, HandlerError};
use tracing::error;

/// Error handler that records handler failures in the log, tagged with the job type.
#[derive(Debug, Clone)]
pub struct LogErrorHandler {
    job_type: &'static str,
}

impl LogErrorHandler {
    pub fn new(job_type: &'static str) -> Self {
        Self { job_type }
    }
}

impl ErrorHandler for LogErrorHandler {
    fn on_error(&self, err: &HandlerError) {
        error!(job_type = self.job_type, error = %err, "job failed");
    }
}
