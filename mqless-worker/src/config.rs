use mqless_job::ValidationError;

use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::registry::MissingErrorHandlerPolicy;

pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Settings of one worker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Namespacing token handed to the store to scope its persisted collection.
    pub app_id: String,
    /// Number of parallel workers started by [`JobWorker::run`](crate::JobWorker::run).
    pub worker_count: usize,
    /// Capacity of the dispatch queue between the dispatch cycle and the workers.
    pub queue_capacity: usize,
    /// Whether job types registered without an error handler are rejected at dispatch.
    pub require_error_handler: bool,
}

impl Default for WorkerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            app_id: String::new(),
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            require_error_handler: true,
        }
    }
}

impl WorkerConfig {
    #[inline]
    pub fn new(app_id: impl Into<String>, worker_count: usize) -> Self {
        Self {
            app_id: app_id.into(),
            worker_count,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[inline]
    pub fn with_require_error_handler(mut self, required: bool) -> Self {
        self.require_error_handler = required;
        self
    }

    #[inline]
    pub const fn missing_error_handler_policy(&self) -> MissingErrorHandlerPolicy {
        if self.require_error_handler {
            MissingErrorHandlerPolicy::Reject
        } else {
            MissingErrorHandlerPolicy::Ignore
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.app_id.trim().is_empty() {
            return Err(ValidationError::InvalidConfig(
                "app_id must not be empty".to_owned(),
            ));
        }
        if self.worker_count == 0 {
            return Err(ValidationError::InvalidConfig(
                "worker_count must be greater than 0".to_owned(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig(
                "queue_capacity must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}
