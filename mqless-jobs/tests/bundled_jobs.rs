use std::sync::Arc;

use mqless_jobs::{job_types, register_all_handlers};
use mqless_worker::{Job, JobEvent, JobId, JobStatus, JobWorker, MemoryJobStore, WorkerConfig};

#[tokio::test]
async fn bundled_handlers_process_seeded_jobs() {
    let store = Arc::new(
        MemoryJobStore::with_jobs(vec![
            Job::new(job_types::SLICE_LEN, Some(b"[1, 2]".to_vec())),
            Job::new(job_types::PRINT_MSG, Some(br#"{"msg":"message-1"}"#.to_vec())),
            Job::new(job_types::SLICE_LEN, Some(br#"{"msg":"message-2"}"#.to_vec())),
            Job::new("resize-image", None),
        ])
        .await,
    );

    let mut worker = JobWorker::new(WorkerConfig::new("jobs_test", 2), store.clone()).unwrap();
    register_all_handlers(&mut worker).unwrap();
    assert!(worker.registry().contains(job_types::SLICE_LEN));
    assert!(worker.registry().contains(job_types::PRINT_MSG));

    let (running, mut events) = worker.run_with_events(16);
    let summary = running.notify().await.unwrap();
    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.rejected, 1);
    running.shutdown().await;

    let status = |id| {
        let store = store.clone();
        async move { store.find(JobId::new(id)).await.unwrap().status }
    };
    assert_eq!(status(1).await, JobStatus::Finished);
    assert_eq!(status(2).await, JobStatus::Finished);
    // a JSON object is not a slice
    assert_eq!(status(3).await, JobStatus::Error);
    assert_eq!(status(4).await, JobStatus::Error);

    let mut completed_with_error = 0;
    let mut rejected = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            JobEvent::Completed {
                status, error: Some(_), ..
            } => {
                assert_eq!(status, JobStatus::Error);
                completed_with_error += 1;
            }
            JobEvent::Rejected { job_id, .. } => {
                assert_eq!(job_id, JobId::new(4));
                rejected += 1;
            }
            _ => {}
        }
    }
    assert_eq!(completed_with_error, 1);
    assert_eq!(rejected, 1);
}
