//! Claim/dispatch engine and worker pool for the mqless job processor.
//!
//! A [`JobWorker`] owns the handler registry while it is being configured. Once started it
//! becomes a [`RunningWorker`]: every call to [`RunningWorker::notify`] drains the claimable
//! jobs of the store into a bounded [`DispatchQueue`], and a fixed [`WorkerPool`] executes them
//! and persists their final status.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mqless_worker::{
//!     error_handler_fn, handler_fn, HandlerError, Job, JobStore, JobWorker, MemoryJobStore,
//!     WorkerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryJobStore::new());
//!     store.put(&Job::new("print-msg", Some(br#"{"msg":"hi"}"#.to_vec()))).await?;
//!
//!     let mut worker = JobWorker::new(WorkerConfig::new("demo", 2), store.clone())?;
//!     worker.register_handler(
//!         "print-msg",
//!         handler_fn(|_payload: Option<Vec<u8>>| async { Ok::<(), HandlerError>(()) }),
//!         error_handler_fn(|err: &HandlerError| eprintln!("print-msg failed: {err}")),
//!     )?;
//!
//!     let running = worker.run();
//!     running.notify().await?;
//!     running.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod dispatcher;
mod error;
mod events;
mod pool;
mod queue;
mod registry;
mod worker;

pub use config::{WorkerConfig, DEFAULT_WORKER_COUNT};
pub use dispatcher::{DispatchSummary, Dispatcher, MAX_CONSECUTIVE_GET_FAILURES};
pub use error::WorkerError;
pub use events::{EventReporter, JobEvent, EVENT_CHANNEL_CAPACITY};
pub use pool::{WorkerPool, ABANDONED_MESSAGE};
pub use queue::{DispatchQueue, DispatchedJob, QueueReceiver, QueueSender, DEFAULT_QUEUE_CAPACITY};
pub use registry::{Binding, HandlerRegistry, MissingErrorHandlerPolicy};
pub use worker::{JobWorker, RunningWorker};

pub use mqless_job::{
    async_trait, error_handler_fn, handler_fn, DispatchError, ErrorHandler, HandlerError, Job,
    JobHandler, JobId, JobStatus, JobStore, MemoryJobStore, NoOpErrorHandler, NoOpHandler,
    StoreError, ValidationError,
};
