//! Bounded FIFO between the dispatch cycle and the worker pool.
//!
//! The queue is the backpressure control point of the processor: when workers fall behind,
//! [`QueueSender::push`] waits for free capacity, which in turn stops the dispatch cycle from
//! claiming further jobs.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use mqless_job::{ErrorHandler, Job, JobHandler};

use crate::registry::Binding;

/// Number of jobs the dispatch queue holds before producers have to wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A claimed job together with the handlers bound to it at dispatch time.
pub struct DispatchedJob {
    pub job: Job,
    pub handler: Arc<dyn JobHandler>,
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl DispatchedJob {
    pub fn new(job: Job, binding: Binding) -> Self {
        Self {
            job,
            handler: binding.handler,
            error_handler: binding.error_handler,
        }
    }
}

impl fmt::Debug for DispatchedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchedJob")
            .field("job", &self.job)
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Bounded multi-producer, multi-consumer FIFO of [`DispatchedJob`]s.
#[derive(Debug)]
pub struct DispatchQueue {
    sender: QueueSender,
    receiver: QueueReceiver,
}

impl DispatchQueue {
    /// Create a queue holding at most `capacity` jobs. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let closed = CancellationToken::new();
        Self {
            sender: QueueSender {
                tx,
                capacity,
                closed: closed.clone(),
            },
            receiver: QueueReceiver {
                rx: Arc::new(Mutex::new(rx)),
                closed,
            },
        }
    }

    pub fn sender(&self) -> QueueSender {
        self.sender.clone()
    }

    pub fn receiver(&self) -> QueueReceiver {
        self.receiver.clone()
    }

    /// Split into the producer and consumer halves.
    ///
    /// Once every sender is dropped or [`QueueReceiver::close`] is called, receivers drain the
    /// remaining jobs and then observe the queue as closed.
    pub fn split(self) -> (QueueSender, QueueReceiver) {
        (self.sender, self.receiver)
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Producer half of the dispatch queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<DispatchedJob>,
    capacity: usize,
    closed: CancellationToken,
}

impl QueueSender {
    /// Push a job, waiting while the queue is full.
    ///
    /// Returns the job back when the queue was closed or every receiver is gone.
    pub async fn push(&self, job: DispatchedJob) -> Result<(), DispatchedJob> {
        if self.closed.is_cancelled() {
            return Err(job);
        }
        let permit = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(job),
            permit = self.tx.reserve() => permit,
        };
        match permit {
            Ok(permit) => {
                permit.send(job);
                Ok(())
            }
            Err(_) => Err(job),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued jobs plus slots reserved by pushes that have not sent yet.
    ///
    /// A push holds its slot from reservation until the job is sent, so this can exceed the
    /// number of jobs a worker could pop right now.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

/// Consumer half of the dispatch queue, shareable between workers.
#[derive(Clone)]
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<DispatchedJob>>>,
    closed: CancellationToken,
}

impl fmt::Debug for QueueReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReceiver")
            .field("rx", &"<Mutex<Receiver<DispatchedJob>>>")
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}

impl QueueReceiver {
    /// Wait for the next job. `None` once the queue is closed and drained.
    ///
    /// Cancel safe: dropping the future never loses a job.
    pub async fn pop(&self) -> Option<DispatchedJob> {
        let mut rx = self.rx.lock().await;
        if self.closed.is_cancelled() {
            return rx.try_recv().ok();
        }
        tokio::select! {
            biased;
            job = rx.recv() => job,
            _ = self.closed.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Stop accepting new jobs; already queued jobs can still be popped.
    pub fn close(&self) {
        self.closed.cancel();
    }
}
