//! The job store contract and an in-memory reference store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{Job, JobId, JobStatus};

/// Durable backing of the job queue.
///
/// Implementations must make [`get`](JobStore::get) an atomic claim: the oldest `Queued` job
/// is moved to `Doing` in the same step that selects it, so that concurrent callers (in this
/// process or another one sharing the store) never receive the same job twice. A failed `get`
/// must leave no job half-claimed.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Claim the oldest queued job, or return [`Job::sentinel`] when nothing is queued.
    async fn get(&self) -> Result<Job, StoreError>;

    /// Insert `job` as `Queued` when its id is unassigned, otherwise update its status.
    ///
    /// Status updates only move forward (see [`JobStatus::can_transition_to`]); an update to an
    /// unknown id or one that would move a job backwards leaves the store unchanged.
    async fn put(&self, job: &Job) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    async fn get(&self) -> Result<Job, StoreError> {
        (**self).get().await
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        (**self).put(job).await
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    jobs: BTreeMap<JobId, Job>,
}

/// Process-local [`JobStore`] keeping jobs in memory.
///
/// Claims are serialized by a write lock, which satisfies the claim contract for callers that
/// share the same instance.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    state: Arc<RwLock<MemoryState>>,
}

impl fmt::Debug for MemoryJobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryJobStore")
            .field("state", &"<RwLock<MemoryState>>")
            .finish()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with jobs that already carry ids, e.g. fixtures in tests.
    ///
    /// Jobs with an unassigned id are inserted as new jobs instead.
    pub async fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for job in jobs {
                if job.id.is_unassigned() {
                    insert_new(&mut state, &job);
                } else {
                    state.next_id = state.next_id.max(job.id.get());
                    state.jobs.insert(job.id, job);
                }
            }
        }
        store
    }

    /// Look up a job by id.
    pub async fn find(&self, id: JobId) -> Option<Job> {
        self.state.read().await.jobs.get(&id).cloned()
    }

    /// All jobs ordered by id.
    pub async fn jobs(&self) -> Vec<Job> {
        self.state.read().await.jobs.values().cloned().collect()
    }

    pub async fn count_by_status(&self, status: JobStatus) -> usize {
        self.state
            .read()
            .await
            .jobs
            .values()
            .filter(|job| job.status == status)
            .count()
    }
}

fn insert_new(state: &mut MemoryState, job: &Job) -> JobId {
    state.next_id += 1;
    let id = JobId::new(state.next_id);
    state.jobs.insert(
        id,
        Job {
            id,
            created_at: Utc::now(),
            status: JobStatus::Queued,
            job_type: job.job_type.clone(),
            payload: job.payload.clone(),
        },
    );
    id
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self) -> Result<Job, StoreError> {
        let mut state = self.state.write().await;
        let oldest = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Queued)
            .min_by_key(|job| (job.created_at, job.id))
            .map(|job| job.id);

        match oldest.and_then(|id| state.jobs.get_mut(&id)) {
            Some(job) => {
                job.start();
                Ok(job.clone())
            }
            None => Ok(Job::sentinel()),
        }
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if job.id.is_unassigned() {
            insert_new(&mut state, job);
            return Ok(());
        }
        if let Some(stored) = state.jobs.get_mut(&job.id) {
            if stored.status.can_transition_to(job.status) {
                stored.status = job.status;
            }
        }
        Ok(())
    }
}
