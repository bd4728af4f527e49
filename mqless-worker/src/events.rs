//! Outcome notifications delivered to the embedding process.

use tokio::sync::mpsc;
use tracing::warn;

use mqless_job::{DispatchError, JobId, JobStatus, StoreError};

/// Number of undelivered events kept before new ones are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Something that happened to a claimed job.
#[derive(Debug)]
pub enum JobEvent {
    /// The handler ran and the final status was persisted.
    Completed {
        job_id: JobId,
        job_type: String,
        status: JobStatus,
        error: Option<String>,
    },
    /// The job was routed to `Error` without running.
    Rejected {
        job_id: JobId,
        job_type: String,
        reason: DispatchError,
    },
    /// Persisting the job's final status failed; the store still holds the previous status.
    PersistFailed {
        job_id: JobId,
        job_type: String,
        status: JobStatus,
        error: StoreError,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Completed { job_id, .. }
            | Self::Rejected { job_id, .. }
            | Self::PersistFailed { job_id, .. } => *job_id,
        }
    }
}

/// Sending side of the event channel. Reporting never blocks a worker.
#[derive(Debug, Clone, Default)]
pub struct EventReporter {
    tx: Option<mpsc::Sender<JobEvent>>,
}

impl EventReporter {
    /// A reporter paired with the receiver the observer reads from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<JobEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn report(&self, event: JobEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(job_id = %event.job_id(), "event channel full; dropping job event");
            }
            // The observer went away; nothing left to notify.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
