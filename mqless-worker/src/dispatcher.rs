//! The poll/dispatch cycle.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use mqless_job::{DispatchError, Job, JobStore};

use crate::error::WorkerError;
use crate::events::{EventReporter, JobEvent};
use crate::queue::{DispatchedJob, QueueSender};
use crate::registry::HandlerRegistry;

/// Consecutive failed claims after which a dispatch cycle gives up.
pub const MAX_CONSECUTIVE_GET_FAILURES: u32 = 3;

/// What one dispatch cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Jobs handed to the worker pool.
    pub dispatched: usize,
    /// Jobs marked `Error` because no usable handler was registered.
    pub rejected: usize,
}

impl DispatchSummary {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dispatched == 0 && self.rejected == 0
    }
}

/// Drains claimable jobs from the store into the dispatch queue.
///
/// Cheap to clone; clones share the store, registry and queue.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    queue: QueueSender,
    events: EventReporter,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &"<dyn JobStore>")
            .field("registry", &self.registry)
            .field("queue", &self.queue)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        queue: QueueSender,
        events: EventReporter,
    ) -> Self {
        Self {
            store,
            registry,
            queue,
            events,
        }
    }

    /// Run one full dispatch cycle.
    ///
    /// Claims jobs until the store reports that none are queued. Jobs without a usable handler
    /// are persisted as `Error` and skipped; the rest are pushed to the worker pool, waiting
    /// whenever the queue is full. A store failure is retried until
    /// [`MAX_CONSECUTIVE_GET_FAILURES`] consecutive claims failed, then returned.
    pub async fn notify(&self) -> Result<DispatchSummary, WorkerError> {
        let mut summary = DispatchSummary::default();
        let mut failures = 0u32;

        loop {
            let job = match self.store.get().await {
                Ok(job) => {
                    failures = 0;
                    job
                }
                Err(err) => {
                    failures += 1;
                    warn!(attempt = failures, error = %err, "failed to get job");
                    if failures >= MAX_CONSECUTIVE_GET_FAILURES {
                        error!(
                            attempts = failures,
                            error = %err,
                            "giving up dispatch cycle after repeated store failures"
                        );
                        return Err(err.into());
                    }
                    continue;
                }
            };

            if job.id.is_unassigned() {
                if !job.is_sentinel() {
                    warn!(job_type = %job.job_type, "store returned a job without id; ending dispatch cycle");
                }
                break;
            }

            match self.registry.resolve(&job.job_type) {
                Ok(binding) => {
                    debug!(job_id = %job.id, job_type = %job.job_type, "dispatching job");
                    if let Err(rejected) = self.queue.push(DispatchedJob::new(job, binding)).await {
                        self.abandon(rejected.job).await;
                        return Err(WorkerError::QueueClosed);
                    }
                    summary.dispatched += 1;
                }
                Err(reason) => {
                    self.reject(job, reason).await;
                    summary.rejected += 1;
                }
            }
        }

        if !summary.is_empty() {
            info!(
                dispatched = summary.dispatched,
                rejected = summary.rejected,
                "dispatch cycle completed"
            );
        }
        Ok(summary)
    }

    async fn reject(&self, mut job: Job, reason: DispatchError) {
        warn!(job_id = %job.id, job_type = %job.job_type, %reason, "job cannot be dispatched");
        job.fail();
        match self.store.put(&job).await {
            Ok(()) => self.events.report(JobEvent::Rejected {
                job_id: job.id,
                job_type: job.job_type,
                reason,
            }),
            Err(err) => {
                error!(job_id = %job.id, error = %err, "failed to persist rejected job");
                self.events.report(JobEvent::PersistFailed {
                    job_id: job.id,
                    job_type: job.job_type,
                    status: job.status,
                    error: err,
                });
            }
        }
    }

    /// A claimed job that can no longer reach a worker is closed out as `Error`.
    async fn abandon(&self, mut job: Job) {
        error!(job_id = %job.id, job_type = %job.job_type, "dispatch queue closed; marking claimed job as error");
        job.fail();
        if let Err(err) = self.store.put(&job).await {
            error!(job_id = %job.id, error = %err, "failed to persist abandoned job");
            self.events.report(JobEvent::PersistFailed {
                job_id: job.id,
                job_type: job.job_type,
                status: job.status,
                error: err,
            });
        }
    }
}
