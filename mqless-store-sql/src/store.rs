use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Row};
use tracing::{debug, error, info};

use mqless_db_connection::{create_pool, DbConnectionConfig, DbPool};
use mqless_job::{format_timestamp, Job, JobId, JobStatus, JobStore, StoreError};

use crate::error::store_error;
use crate::row::{id_param, payload_text, JobRow};
use crate::schema::{create_table_statements, table_name, Queries};

/// [`JobStore`] persisting jobs in the relational table `<app_id>_jobs`.
///
/// Claims never hold a transaction open. A claim selects the oldest queued row and then moves
/// it to `doing` with an update guarded by `status = 'queued'`; when the guard matches no row,
/// another claimer won the race and the next-oldest row is tried. This keeps claims exclusive
/// across every process sharing the table.
#[derive(Clone)]
pub struct SqlJobStore {
    pool: DbPool,
    table: String,
    queries: Queries,
}

impl fmt::Debug for SqlJobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlJobStore")
            .field("pool", &"<DbPool>")
            .field("table", &self.table)
            .finish()
    }
}

impl SqlJobStore {
    /// Wrap an existing pool. The table is not created; see [`SqlJobStore::ensure_table`].
    pub fn new(pool: DbPool, app_id: &str) -> Result<Self, StoreError> {
        let table = table_name(app_id)?;
        let queries = Queries::new(&table);
        Ok(Self {
            pool,
            table,
            queries,
        })
    }

    /// Open a pool for `config` and make sure the job table of `app_id` exists.
    pub async fn connect(config: &DbConnectionConfig, app_id: &str) -> Result<Self, StoreError> {
        let pool = create_pool(config)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let store = Self::new(pool, app_id)?;
        store.ensure_table().await?;
        Ok(store)
    }

    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the job table and its claim index if they do not exist yet.
    pub async fn ensure_table(&self) -> Result<(), StoreError> {
        for statement in create_table_statements(&self.table) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
        }
        info!(table = %self.table, "job table ready");
        Ok(())
    }

    /// Insert `job` as a new queued job and return the id the database assigned.
    pub async fn insert(&self, job: &Job) -> Result<JobId, StoreError> {
        let created_at = format_timestamp(&Utc::now());
        let payload = payload_text(job)?;
        let query = sqlx::query(&self.queries.insert)
            .bind(created_at)
            .bind(JobStatus::Queued.as_str())
            .bind(job.job_type.as_str())
            .bind(payload);

        #[cfg(feature = "sqlite")]
        let id = {
            let result = query.execute(&self.pool).await.map_err(store_error)?;
            u64::try_from(result.last_insert_rowid()).unwrap_or_default()
        };
        #[cfg(feature = "mysql")]
        let id = {
            let result = query.execute(&self.pool).await.map_err(store_error)?;
            result.last_insert_id()
        };
        #[cfg(feature = "postgres")]
        let id = {
            let row = query.fetch_one(&self.pool).await.map_err(store_error)?;
            let id: i64 = row.try_get("id").map_err(store_error)?;
            u64::try_from(id).unwrap_or_default()
        };

        let id = JobId::new(id);
        debug!(job_id = %id, job_type = %job.job_type, "job enqueued");
        Ok(id)
    }

    /// Set the status of the job `id`. Unknown ids and backward moves are ignored.
    pub async fn update_status(&self, id: JobId, status: JobStatus) -> Result<(), StoreError> {
        let result = sqlx::query(self.queries.update_status(status))
            .bind(status.as_str())
            .bind(id_param(id)?)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            debug!(job_id = %id, %status, "status update matched no job that can move to this status");
        }
        Ok(())
    }

    pub async fn find(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(&self.queries.find)
            .bind(id_param(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(Job::try_from).transpose()
    }

    pub async fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(&self.queries.count_by_status)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Move row `id` from `from` to `to`. False when the row was not in `from` anymore.
    async fn transition(&self, id: i64, from: JobStatus, to: JobStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(&self.queries.transition)
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn get(&self) -> Result<Job, StoreError> {
        loop {
            let row = sqlx::query(&self.queries.select_oldest)
                .bind(JobStatus::Queued.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
            let Some(row) = row else {
                return Ok(Job::sentinel());
            };
            let row_id: i64 = row.try_get("id").map_err(store_error)?;

            let decoded = JobRow::from_row(&row)
                .map_err(store_error)
                .and_then(Job::try_from);
            let mut job = match decoded {
                Ok(job) => job,
                Err(err) => {
                    // an undecodable row would otherwise stay the oldest queued job forever
                    error!(row_id, table = %self.table, error = %err, "moving corrupt job row to error");
                    self.transition(row_id, JobStatus::Queued, JobStatus::Error)
                        .await?;
                    continue;
                }
            };

            if self
                .transition(row_id, JobStatus::Queued, JobStatus::Doing)
                .await?
            {
                job.start();
                debug!(job_id = %job.id, job_type = %job.job_type, "job claimed");
                return Ok(job);
            }
            debug!(row_id, "job claimed by another worker; retrying");
        }
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        if job.id.is_unassigned() {
            self.insert(job).await.map(|_| ())
        } else {
            self.update_status(job.id, job.status).await
        }
    }
}
