//! Fixed-size pool of workers executing dispatched jobs.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mqless_job::{HandlerError, JobStore};

use crate::events::{EventReporter, JobEvent};
use crate::queue::{DispatchedJob, QueueReceiver};

/// Error recorded for dispatched jobs that never ran because the pool stopped.
pub const ABANDONED_MESSAGE: &str = "worker pool shut down before execution";

/// Handle to a set of running workers.
///
/// Workers check their stop signal only between jobs: a job that already started always runs
/// to completion and has its status persisted.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    receiver: QueueReceiver,
    store: Arc<dyn JobStore>,
    events: EventReporter,
    shutdown_token: CancellationToken,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .field("cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `worker_count` workers on the current tokio runtime and return immediately.
    pub fn start(
        worker_count: usize,
        receiver: QueueReceiver,
        store: Arc<dyn JobStore>,
        events: EventReporter,
        shutdown_token: CancellationToken,
    ) -> Self {
        let handles = (0..worker_count)
            .map(|index| {
                tokio::spawn(work(
                    index,
                    receiver.clone(),
                    store.clone(),
                    events.clone(),
                    shutdown_token.clone(),
                ))
            })
            .collect();

        info!(worker_count, "worker pool started");
        Self {
            handles,
            receiver,
            store,
            events,
            shutdown_token,
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Token that stops every worker at its next wait for a job.
    ///
    /// Cancelling it has the effect of [`WorkerPool::shutdown`] without waiting: the queue is
    /// closed, so further pushes fail, and jobs left in it are closed out as `Error`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// True once every worker has exited.
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(JoinHandle::is_finished)
    }

    /// Stop accepting jobs, let the workers execute everything already queued, then wait for
    /// them to exit.
    pub async fn drain(self) {
        self.receiver.close();
        self.join().await;
        info!("worker pool drained");
    }

    /// Stop the workers after their current job and wait for them to exit.
    ///
    /// Jobs still waiting in the queue never ran; they are closed out as `Error`.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        self.receiver.close();
        let receiver = self.receiver.clone();
        let store = self.store.clone();
        let events = self.events.clone();
        self.join().await;

        // workers close out what they see on exit; this catches a push that raced the close
        abandon_queued(&receiver, store.as_ref(), &events).await;
        info!("worker pool stopped");
    }

    async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "worker task failed");
            }
        }
    }
}

async fn work(
    index: usize,
    receiver: QueueReceiver,
    store: Arc<dyn JobStore>,
    events: EventReporter,
    shutdown_token: CancellationToken,
) {
    debug!(worker = index, "worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => None,
            job = receiver.pop() => job,
        };
        let Some(dispatched) = next else {
            break;
        };
        execute(dispatched, store.as_ref(), &events).await;
    }
    if shutdown_token.is_cancelled() {
        receiver.close();
        abandon_queued(&receiver, store.as_ref(), &events).await;
    }
    debug!(worker = index, "worker stopped");
}

/// Mark every job left in a closed queue as `Error`.
async fn abandon_queued(receiver: &QueueReceiver, store: &dyn JobStore, events: &EventReporter) {
    let mut abandoned = 0usize;
    while let Some(DispatchedJob { mut job, .. }) = receiver.pop().await {
        job.fail();
        abandoned += 1;
        match store.put(&job).await {
            Ok(()) => events.report(JobEvent::Completed {
                job_id: job.id,
                job_type: job.job_type,
                status: job.status,
                error: Some(ABANDONED_MESSAGE.to_owned()),
            }),
            Err(err) => {
                error!(job_id = %job.id, error = %err, "failed to persist abandoned job");
                events.report(JobEvent::PersistFailed {
                    job_id: job.id,
                    job_type: job.job_type,
                    status: job.status,
                    error: err,
                });
            }
        }
    }
    if abandoned > 0 {
        warn!(abandoned, "queued jobs marked as error during shutdown");
    }
}

/// Run one dispatched job and persist its final status.
pub(crate) async fn execute(dispatched: DispatchedJob, store: &dyn JobStore, events: &EventReporter) {
    let DispatchedJob {
        mut job,
        handler,
        error_handler,
    } = dispatched;

    let outcome = AssertUnwindSafe(handler.execute(job.payload.as_deref()))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic.as_ref()))));

    let error = match outcome {
        Ok(()) => {
            job.finish();
            debug!(job_id = %job.id, job_type = %job.job_type, "job finished");
            None
        }
        Err(err) => {
            warn!(job_id = %job.id, job_type = %job.job_type, error = %err, "job handler failed");
            if let Some(error_handler) = &error_handler {
                let notified =
                    std::panic::catch_unwind(AssertUnwindSafe(|| error_handler.on_error(&err)));
                if notified.is_err() {
                    error!(job_id = %job.id, "error handler panicked");
                }
            }
            job.fail();
            Some(err.to_string())
        }
    };

    match store.put(&job).await {
        Ok(()) => events.report(JobEvent::Completed {
            job_id: job.id,
            job_type: job.job_type,
            status: job.status,
            error,
        }),
        Err(err) => {
            error!(
                job_id = %job.id,
                status = %job.status,
                error = %err,
                "failed to persist job status"
            );
            events.report(JobEvent::PersistFailed {
                job_id: job.id,
                job_type: job.job_type,
                status: job.status,
                error: err,
            });
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use mqless_job::{
        async_trait, error_handler_fn, handler_fn, Job, JobHandler, JobId, JobStatus,
        MemoryJobStore, NoOpHandler, StoreError,
    };

    use crate::queue::DispatchQueue;

    async fn claimed(store: &MemoryJobStore, job_type: &str) -> Job {
        store.put(&Job::new(job_type, None)).await.unwrap();
        store.get().await.unwrap()
    }

    struct PanickingHandler;

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn execute(&self, _payload: Option<&[u8]>) -> Result<(), HandlerError> {
            panic!("boom");
        }
    }

    struct RejectingStore;

    #[async_trait]
    impl JobStore for RejectingStore {
        async fn get(&self) -> Result<Job, StoreError> {
            Ok(Job::sentinel())
        }

        async fn put(&self, _job: &Job) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }
    }

    #[tokio::test]
    async fn failure_invokes_error_handler_once() {
        let store = MemoryJobStore::new();
        let job = claimed(&store, "slice-len").await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let dispatched = DispatchedJob {
            job,
            handler: Arc::new(handler_fn(|_payload: Option<Vec<u8>>| async {
                Err::<(), _>(HandlerError::failed("intended-error"))
            })),
            error_handler: Some(Arc::new(error_handler_fn(move |err: &HandlerError| {
                assert_eq!(err, &HandlerError::failed("intended-error"));
                seen.fetch_add(1, Ordering::SeqCst);
            }))),
        };
        execute(dispatched, &store, &EventReporter::disabled()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.find(JobId::new(1)).await.unwrap().status,
            JobStatus::Error
        );
    }

    #[tokio::test]
    async fn panicking_handler_marks_job_error() {
        let store = MemoryJobStore::new();
        let job = claimed(&store, "slice-len").await;
        let (events, mut rx) = EventReporter::channel(4);

        let dispatched = DispatchedJob {
            job,
            handler: Arc::new(PanickingHandler),
            error_handler: None,
        };
        execute(dispatched, &store, &events).await;

        assert_eq!(
            store.find(JobId::new(1)).await.unwrap().status,
            JobStatus::Error
        );
        match rx.recv().await.unwrap() {
            JobEvent::Completed { status, error, .. } => {
                assert_eq!(status, JobStatus::Error);
                assert_eq!(error.as_deref(), Some("handler panicked: boom"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn persist_failure_is_reported() {
        let mut job = Job::new("slice-len", None);
        job.id = JobId::new(5);
        job.start();
        let (events, mut rx) = EventReporter::channel(4);

        let dispatched = DispatchedJob {
            job,
            handler: Arc::new(NoOpHandler),
            error_handler: None,
        };
        execute(dispatched, &RejectingStore, &events).await;

        match rx.recv().await.unwrap() {
            JobEvent::PersistFailed { job_id, status, error, .. } => {
                assert_eq!(job_id, JobId::new(5));
                assert_eq!(status, JobStatus::Finished);
                assert!(matches!(error, StoreError::Unavailable(_)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let queue = DispatchQueue::new(4);
        let pool = WorkerPool::start(
            3,
            queue.receiver(),
            Arc::new(MemoryJobStore::new()),
            EventReporter::disabled(),
            CancellationToken::new(),
        );
        assert_eq!(pool.worker_count(), 3);

        tokio::time::timeout(Duration::from_secs(1), pool.shutdown())
            .await
            .expect("idle workers stop promptly");
        assert!(queue.sender().is_closed());
    }

    #[tokio::test]
    async fn drain_runs_queued_jobs() {
        let store = MemoryJobStore::new();
        let queue = DispatchQueue::new(8);
        for _ in 0..3 {
            let job = claimed(&store, "slice-len").await;
            queue
                .sender()
                .push(DispatchedJob {
                    job,
                    handler: Arc::new(NoOpHandler),
                    error_handler: None,
                })
                .await
                .unwrap();
        }

        let pool = WorkerPool::start(
            2,
            queue.receiver(),
            Arc::new(store.clone()),
            EventReporter::disabled(),
            CancellationToken::new(),
        );
        tokio::time::timeout(Duration::from_secs(1), pool.drain())
            .await
            .expect("drain completes");

        assert_eq!(store.count_by_status(JobStatus::Finished).await, 3);
    }
}
