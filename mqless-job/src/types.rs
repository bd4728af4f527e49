//! Core types for the job processor.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Store-assigned job identifier.
///
/// `0` is reserved: it marks a job that has not been inserted yet and, together with an
/// empty job type, the "no job available" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub const UNASSIGNED: JobId = JobId(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    #[inline]
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Doing,
    Finished,
    Error,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [Self::Queued, Self::Doing, Self::Finished, Self::Error];

    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Whether moving from `self` to `next` is a forward step of the state machine.
    ///
    /// Re-applying the current status is allowed so that status updates stay idempotent.
    pub const fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Queued)
                | (Self::Queued, Self::Doing)
                | (Self::Doing, Self::Doing)
                | (Self::Doing, Self::Finished)
                | (Self::Doing, Self::Error)
                | (Self::Finished, Self::Finished)
                | (Self::Error, Self::Error)
        )
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Doing => "doing",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "doing" => Ok(Self::Doing),
            "finished" => Ok(Self::Finished),
            "error" => Ok(Self::Error),
            other => Err(StoreError::Corrupt(format!("unknown job status '{other}'"))),
        }
    }
}

/// A unit of work as persisted by a [`JobStore`](crate::JobStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    pub job_type: String,
    pub payload: Option<Vec<u8>>,
}

impl Default for Job {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl Job {
    /// Create a new, not yet inserted job in the `Queued` state.
    #[inline]
    pub fn new(job_type: impl Into<String>, payload: Option<Vec<u8>>) -> Self {
        Self {
            id: JobId::UNASSIGNED,
            created_at: Utc::now(),
            status: JobStatus::Queued,
            job_type: job_type.into(),
            payload,
        }
    }

    /// Create a new job whose payload is the JSON encoding of `value`.
    pub fn with_json(
        job_type: impl Into<String>,
        value: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(job_type, Some(payload)))
    }

    /// The well-known "no job available" value returned by an empty store.
    #[inline]
    pub fn sentinel() -> Self {
        Self {
            id: JobId::UNASSIGNED,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            status: JobStatus::Queued,
            job_type: String::new(),
            payload: None,
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.id.is_unassigned() && self.job_type.is_empty()
    }

    /// Mark the job as claimed.
    #[inline]
    pub fn start(&mut self) {
        self.status = JobStatus::Doing;
    }

    /// Mark the job as successfully executed.
    #[inline]
    pub fn finish(&mut self) {
        self.status = JobStatus::Finished;
    }

    /// Mark the job as failed.
    #[inline]
    pub fn fail(&mut self) {
        self.status = JobStatus::Error;
    }

    /// Payload as a UTF-8 string, if present and valid.
    pub fn payload_str(&self) -> Option<&str> {
        self.payload
            .as_deref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

/// Render a timestamp as fixed-width RFC 3339 with nanoseconds so that lexical order matches
/// chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a timestamp produced by [`format_timestamp`].
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{raw}': {e}")))
}
