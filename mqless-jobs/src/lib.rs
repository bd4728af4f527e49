//! Concrete job handlers for the mqless job processor.
//!
//! # Job Types
//!
//! - `slice-len` - Log the length of a JSON array payload
//! - `print-msg` - Log the `msg` field of a JSON object payload
//!
//! Both are registered with a [`LogErrorHandler`], so failures end up in the log.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mqless_job::MemoryJobStore;
//! use mqless_jobs::register_all_handlers;
//! use mqless_worker::{JobWorker, WorkerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryJobStore::new());
//!     let mut worker = JobWorker::new(WorkerConfig::new("demo", 2), store).unwrap();
//!     register_all_handlers(&mut worker).unwrap();
//!     let running = worker.run();
//!     running.notify().await.unwrap();
//!     running.shutdown().await;
//! }
//! ```

mod error;
mod log_error;
mod print_msg;
mod slice_len;

pub use error::JobError;
pub use log_error::LogErrorHandler;
pub use print_msg::{PrintMsgHandler, PrintMsgPayload};
pub use slice_len::SliceLenHandler;

use mqless_job::ValidationError;
use mqless_worker::JobWorker;

/// Register all bundled job handlers with the worker.
pub fn register_all_handlers(worker: &mut JobWorker) -> Result<(), ValidationError> {
    worker.register_handler(
        job_types::SLICE_LEN,
        SliceLenHandler::new(),
        LogErrorHandler::new(job_types::SLICE_LEN),
    )?;
    worker.register_handler(
        job_types::PRINT_MSG,
        PrintMsgHandler::new(),
        LogErrorHandler::new(job_types::PRINT_MSG),
    )?;
    Ok(())
}

/// Job type constants for type-safe job references.
pub mod job_types {
    pub const SLICE_LEN: &str = "slice-len";
    pub const PRINT_MSG: &str = "print-msg";
}
