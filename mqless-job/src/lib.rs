//! Job entity, status model and store contract for the mqless job processor.
//!
//! A durable store acts as the queue: producers insert jobs in the `Queued` state, a dispatch
//! cycle claims them one by one (moving them to `Doing`), and workers record the outcome
//! (`Finished` or `Error`). This crate holds the pieces shared by every participant.
//!
//! # Architecture
//!
//! - [`Job`] - A persisted unit of work
//! - [`JobStatus`] - The forward-only status state machine
//! - [`JobStore`] - Contract for claiming and persisting jobs
//! - [`MemoryJobStore`] - In-memory reference store
//! - [`JobHandler`] / [`ErrorHandler`] - User supplied execution logic
//!
//! # Example
//!
//! ```rust,no_run
//! use mqless_job::{Job, JobStore, MemoryJobStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryJobStore::new();
//!     store.put(&Job::new("print-msg", Some(br#"{"msg":"hello"}"#.to_vec()))).await.unwrap();
//!
//!     let claimed = store.get().await.unwrap();
//!     println!("claimed job {} ({})", claimed.id, claimed.status);
//! }
//! ```

mod error;
mod handler;
mod store;
mod types;

pub use error::{DispatchError, HandlerError, StoreError, ValidationError};
pub use handler::{
    error_handler_fn, handler_fn, ErrorHandler, FnErrorHandler, FnHandler, JobHandler,
    NoOpErrorHandler, NoOpHandler,
};
pub use store::{JobStore, MemoryJobStore};
pub use types::{format_timestamp, parse_timestamp, Job, JobId, JobStatus};

// Re-export async_trait for convenience when implementing JobHandler or JobStore
pub use async_trait::async_trait;
