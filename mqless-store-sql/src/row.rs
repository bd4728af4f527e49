use mqless_job::{parse_timestamp, Job, JobId, JobStatus, StoreError};

/// A job as stored in the `<app_id>_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: i64,
    pub created_at: String,
    pub status: String,
    pub job_type: String,
    pub payload: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = u64::try_from(row.id)
            .map_err(|_| StoreError::Corrupt(format!("negative job id {}", row.id)))?;
        Ok(Job {
            id: JobId::new(id),
            created_at: parse_timestamp(&row.created_at)?,
            status: row.status.parse::<JobStatus>()?,
            job_type: row.job_type,
            payload: row.payload.map(String::into_bytes),
        })
    }
}

/// Payload column value of `job`. The column is text, so the payload has to be UTF-8.
pub fn payload_text(job: &Job) -> Result<Option<String>, StoreError> {
    job.payload
        .as_ref()
        .map(|bytes| {
            String::from_utf8(bytes.clone()).map_err(|err| {
                StoreError::Encoding(format!("payload of '{}' is not UTF-8: {err}", job.job_type))
            })
        })
        .transpose()
}

/// Bind value of a job id.
pub fn id_param(id: JobId) -> Result<i64, StoreError> {
    i64::try_from(id.get()).map_err(|_| StoreError::Query(format!("job id {id} is out of range")))
}
