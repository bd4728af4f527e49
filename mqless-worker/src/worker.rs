//! Entry point tying the registry, dispatch cycle and worker pool together.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use mqless_job::{ErrorHandler, JobHandler, JobStore, ValidationError};

use crate::config::WorkerConfig;
use crate::dispatcher::{DispatchSummary, Dispatcher};
use crate::error::WorkerError;
use crate::events::{EventReporter, JobEvent};
use crate::pool::WorkerPool;
use crate::queue::DispatchQueue;
use crate::registry::HandlerRegistry;

/// A job worker being configured.
///
/// Handlers are registered here; [`JobWorker::run`] freezes the registry and starts the pool.
pub struct JobWorker {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    registry: HandlerRegistry,
}

impl fmt::Debug for JobWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobWorker")
            .field("config", &self.config)
            .field("store", &"<dyn JobStore>")
            .field("registry", &self.registry)
            .finish()
    }
}

impl JobWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn JobStore>) -> Result<Self, WorkerError> {
        config.validate()?;
        let registry = HandlerRegistry::new(config.missing_error_handler_policy());
        Ok(Self {
            config,
            store,
            registry,
        })
    }

    #[inline]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// See [`HandlerRegistry::register`].
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        handler: Option<Arc<dyn JobHandler>>,
        error_handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Result<(), ValidationError> {
        self.registry.register(job_type, handler, error_handler)
    }

    pub fn register_handler<H, E>(
        &mut self,
        job_type: impl Into<String>,
        handler: H,
        error_handler: E,
    ) -> Result<(), ValidationError>
    where
        H: JobHandler + 'static,
        E: ErrorHandler + 'static,
    {
        self.registry
            .register_handler(job_type, handler, error_handler)
    }

    /// Start `worker_count` workers and return a handle used to trigger dispatch cycles.
    ///
    /// Job outcomes are only logged; use [`JobWorker::run_with_events`] to observe them.
    pub fn run(self) -> RunningWorker {
        self.start(EventReporter::disabled())
    }

    /// Like [`JobWorker::run`], also returning a receiver of [`JobEvent`]s.
    ///
    /// Events are dropped with a warning once `capacity` of them are left unread.
    pub fn run_with_events(self, capacity: usize) -> (RunningWorker, mpsc::Receiver<JobEvent>) {
        let (events, rx) = EventReporter::channel(capacity);
        (self.start(events), rx)
    }

    fn start(self, events: EventReporter) -> RunningWorker {
        let Self {
            config,
            store,
            registry,
        } = self;

        let (sender, receiver) = DispatchQueue::new(config.queue_capacity).split();
        let pool = WorkerPool::start(
            config.worker_count,
            receiver,
            store.clone(),
            events.clone(),
            CancellationToken::new(),
        );
        info!(
            app_id = %config.app_id,
            job_types = registry.len(),
            queue_capacity = config.queue_capacity,
            "job worker running"
        );
        let dispatcher = Dispatcher::new(store, Arc::new(registry), sender, events);

        RunningWorker { dispatcher, pool }
    }
}

/// Handle to a started job worker.
#[derive(Debug)]
pub struct RunningWorker {
    dispatcher: Dispatcher,
    pool: WorkerPool,
}

impl RunningWorker {
    /// Run one dispatch cycle. See [`Dispatcher::notify`].
    pub async fn notify(&self) -> Result<DispatchSummary, WorkerError> {
        self.dispatcher.notify().await
    }

    /// A dispatcher that can be moved into a timer or another task.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Token that stops the workers at their next wait for a job. See
    /// [`WorkerPool::shutdown_token`]; a later [`RunningWorker::notify`] fails with
    /// [`WorkerError::QueueClosed`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.pool.shutdown_token()
    }

    /// Execute every job already dispatched, then stop the workers.
    pub async fn shutdown(self) {
        self.pool.drain().await;
    }

    /// Stop the workers after their current job. Dispatched jobs that never ran end as `Error`.
    pub async fn stop(self) {
        self.pool.shutdown().await;
    }
}
