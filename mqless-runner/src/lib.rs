//! Host process pieces for running mqless workers.
//!
//! The binary loads [`mqless_config::Config`], opens the SQL job table, registers the bundled
//! handlers from `mqless-jobs` and then calls [`poll_until`] to trigger a dispatch cycle every
//! `poll.interval_ms` until shutdown is requested.

pub mod cli;
pub mod config_helpers;
pub mod tracing_setup;

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use mqless_worker::{DispatchSummary, Job, JobEvent, RunningWorker};

/// Build the job for the `enqueue` command. A payload must be JSON and is stored compacted.
pub fn job_from_cli(job_type: &str, payload: Option<&str>) -> anyhow::Result<Job> {
    anyhow::ensure!(!job_type.is_empty(), "job type must not be empty");
    match payload {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("payload is not valid JSON")?;
            Ok(Job::with_json(job_type, &value)?)
        }
        None => Ok(Job::new(job_type, None)),
    }
}

/// Trigger a dispatch cycle on every tick of `interval` until `shutdown` resolves.
///
/// A cycle in progress is never interrupted, so a claimed job is always handed to a worker.
/// Returns the totals over every completed cycle.
pub async fn poll_until<F>(running: &RunningWorker, interval: Duration, shutdown: F) -> DispatchSummary
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut total = DispatchSummary::default();
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        match running.notify().await {
            Ok(summary) => {
                total.dispatched += summary.dispatched;
                total.rejected += summary.rejected;
            }
            Err(err) => error!(error = %err, "dispatch cycle failed"),
        }
    }
    debug!(
        dispatched = total.dispatched,
        rejected = total.rejected,
        "polling stopped"
    );
    total
}

/// Log every job outcome until all senders are gone.
pub async fn log_events(mut events: mpsc::Receiver<JobEvent>) {
    while let Some(event) = events.recv().await {
        log_event(&event);
    }
}

pub fn log_event(event: &JobEvent) {
    match event {
        JobEvent::Completed {
            job_id,
            job_type,
            status,
            error: None,
        } => info!(job_id = %job_id, %job_type, %status, "job completed"),
        JobEvent::Completed {
            job_id,
            job_type,
            status,
            error: Some(error),
        } => warn!(job_id = %job_id, %job_type, %status, %error, "job completed with error"),
        JobEvent::Rejected {
            job_id,
            job_type,
            reason,
        } => warn!(job_id = %job_id, %job_type, %reason, "job rejected"),
        JobEvent::PersistFailed {
            job_id,
            job_type,
            status,
            error,
        } => error!(job_id = %job_id, %job_type, %status, %error, "job status was not persisted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_payload_is_stored_as_compact_json() {
        let job = job_from_cli("print-msg", Some(r#"{ "msg" : "hello" }"#)).unwrap();
        assert_eq!(job.job_type, "print-msg");
        assert_eq!(job.payload.as_deref(), Some(br#"{"msg":"hello"}"#.as_slice()));
        assert!(job.id.is_unassigned());

        assert_eq!(job_from_cli("slice-len", None).unwrap().payload, None);
    }

    #[test]
    fn cli_job_is_validated() {
        assert!(job_from_cli("", None).is_err());
        assert!(job_from_cli("print-msg", Some("{not json")).is_err());
    }
}
