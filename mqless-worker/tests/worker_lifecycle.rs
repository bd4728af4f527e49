use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mqless_worker::{
    async_trait, error_handler_fn, handler_fn, HandlerError, Job, JobEvent, JobId, JobStatus,
    JobStore, JobWorker, MemoryJobStore, NoOpErrorHandler, StoreError, WorkerConfig, WorkerError,
    ABANDONED_MESSAGE,
};

fn seed_jobs() -> Vec<Job> {
    vec![
        Job::new("slice-len", Some(b"[]".to_vec())),
        Job::new("print-msg", Some(br#"{"msg":"message-1"}"#.to_vec())),
        Job::new("slice-len", Some(br#"{"msg":"message-2"}"#.to_vec())),
    ]
}

fn succeed() -> impl mqless_worker::JobHandler {
    handler_fn(|_payload: Option<Vec<u8>>| async { Ok::<(), HandlerError>(()) })
}

async fn status_of(store: &MemoryJobStore, id: u64) -> JobStatus {
    store.find(JobId::new(id)).await.unwrap().status
}

#[tokio::test]
async fn all_registered_jobs_finish() {
    let store = Arc::new(MemoryJobStore::with_jobs(seed_jobs()).await);
    let mut worker = JobWorker::new(WorkerConfig::new("worker_test", 3), store.clone()).unwrap();
    worker
        .register_handler("slice-len", succeed(), NoOpErrorHandler)
        .unwrap();
    worker
        .register_handler("print-msg", succeed(), NoOpErrorHandler)
        .unwrap();

    let running = worker.run();
    let summary = running.notify().await.unwrap();
    assert_eq!(summary.dispatched, 3);
    running.shutdown().await;

    for id in 1..=3 {
        assert_eq!(status_of(&store, id).await, JobStatus::Finished);
    }
}

#[tokio::test]
async fn job_type_without_error_handler_is_not_executed() {
    let store = Arc::new(MemoryJobStore::with_jobs(seed_jobs()).await);
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();

    let mut worker = JobWorker::new(WorkerConfig::new("worker_test", 2), store.clone()).unwrap();
    worker
        .register_handler("slice-len", succeed(), NoOpErrorHandler)
        .unwrap();
    worker
        .register(
            "print-msg",
            Some(Arc::new(handler_fn(move |_payload: Option<Vec<u8>>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), HandlerError>(()) }
            }))),
            None,
        )
        .unwrap();

    let running = worker.run();
    let summary = running.notify().await.unwrap();
    assert_eq!(summary.dispatched, 2);
    assert_eq!(summary.rejected, 1);
    running.shutdown().await;

    assert_eq!(status_of(&store, 1).await, JobStatus::Finished);
    assert_eq!(status_of(&store, 2).await, JobStatus::Error);
    assert_eq!(status_of(&store, 3).await, JobStatus::Finished);
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ignore_policy_runs_job_type_without_error_handler() {
    let store = Arc::new(MemoryJobStore::with_jobs(seed_jobs()).await);
    let config = WorkerConfig::new("worker_test", 2).with_require_error_handler(false);
    let mut worker = JobWorker::new(config, store.clone()).unwrap();
    worker
        .register_handler("slice-len", succeed(), NoOpErrorHandler)
        .unwrap();
    worker
        .register("print-msg", Some(Arc::new(succeed())), None)
        .unwrap();

    let running = worker.run();
    running.notify().await.unwrap();
    running.shutdown().await;

    assert_eq!(store.count_by_status(JobStatus::Finished).await, 3);
}

#[tokio::test]
async fn failing_handler_notifies_error_handler_once() {
    let store = Arc::new(
        MemoryJobStore::with_jobs([Job::new("slice-len", Some(b"[]".to_vec()))]).await,
    );
    let received = Arc::new(AtomicUsize::new(0));
    let seen = received.clone();

    let mut worker = JobWorker::new(WorkerConfig::new("worker_test", 1), store.clone()).unwrap();
    worker
        .register_handler(
            "slice-len",
            handler_fn(|_payload: Option<Vec<u8>>| async {
                Err::<(), _>(HandlerError::failed("intended-error"))
            }),
            error_handler_fn(move |err: &HandlerError| {
                assert_eq!(err.to_string(), "intended-error");
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

    let (running, mut events) = worker.run_with_events(16);
    running.notify().await.unwrap();
    running.shutdown().await;

    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(status_of(&store, 1).await, JobStatus::Error);
    match events.recv().await.unwrap() {
        JobEvent::Completed { status, error, .. } => {
            assert_eq!(status, JobStatus::Error);
            assert_eq!(error.as_deref(), Some("intended-error"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn empty_store_ends_cycle_immediately() {
    let store = Arc::new(MemoryJobStore::new());
    let worker = JobWorker::new(WorkerConfig::new("worker_test", 1), store).unwrap();
    let running = worker.run();

    let summary = running.notify().await.unwrap();
    assert!(summary.is_empty());
    running.stop().await;
}

struct BrokenStore {
    gets: AtomicUsize,
}

#[async_trait]
impl JobStore for BrokenStore {
    async fn get(&self) -> Result<Job, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("jobstore-get-error".to_owned()))
    }

    async fn put(&self, _job: &Job) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn store_failures_abort_the_cycle() {
    let store = Arc::new(BrokenStore {
        gets: AtomicUsize::new(0),
    });
    let worker = JobWorker::new(WorkerConfig::new("worker_test", 1), store.clone()).unwrap();
    let running = worker.run();

    let err = running.notify().await.unwrap_err();
    assert!(matches!(err, WorkerError::Store(_)));
    assert_eq!(store.gets.load(Ordering::SeqCst), 3);
    running.stop().await;
}

#[tokio::test]
async fn full_queue_holds_back_the_dispatch_cycle() {
    let jobs = (0..4).map(|_| Job::new("slice-len", None));
    let store = Arc::new(MemoryJobStore::with_jobs(jobs).await);
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let permits = gate.clone();

    let config = WorkerConfig::new("worker_test", 1).with_queue_capacity(1);
    let mut worker = JobWorker::new(config, store.clone()).unwrap();
    worker
        .register_handler(
            "slice-len",
            handler_fn(move |_payload: Option<Vec<u8>>| {
                let permits = permits.clone();
                async move {
                    permits
                        .acquire()
                        .await
                        .map_err(|err| HandlerError::failed(err.to_string()))?
                        .forget();
                    Ok::<(), HandlerError>(())
                }
            }),
            NoOpErrorHandler,
        )
        .unwrap();

    let running = worker.run();
    let dispatcher = running.dispatcher();
    let cycle = tokio::spawn(async move { dispatcher.notify().await });

    // one job executing and one waiting in the queue; the cycle is parked on the third
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!cycle.is_finished());
    assert_eq!(store.count_by_status(JobStatus::Queued).await, 1);

    gate.add_permits(4);
    let summary = tokio::time::timeout(Duration::from_secs(2), cycle)
        .await
        .expect("cycle completes once workers catch up")
        .unwrap()
        .unwrap();
    assert_eq!(summary.dispatched, 4);

    running.shutdown().await;
    assert_eq!(store.count_by_status(JobStatus::Finished).await, 4);
}

#[tokio::test]
async fn cancelled_workers_close_the_queue() {
    let jobs = (0..4).map(|_| Job::new("slice-len", None));
    let store = Arc::new(MemoryJobStore::with_jobs(jobs).await);
    let config = WorkerConfig::new("worker_test", 1).with_queue_capacity(2);
    let mut worker = JobWorker::new(config, store.clone()).unwrap();
    worker
        .register_handler("slice-len", succeed(), NoOpErrorHandler)
        .unwrap();

    let running = worker.run();
    running.shutdown_token().cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = tokio::time::timeout(Duration::from_millis(500), running.notify())
        .await
        .expect("dispatch cycle must not wait on a stopped pool");
    assert!(matches!(result, Err(WorkerError::QueueClosed)));
    running.stop().await;

    // nothing is left claimed without a worker to finish it
    assert_eq!(store.count_by_status(JobStatus::Doing).await, 0);
    assert_eq!(store.count_by_status(JobStatus::Finished).await, 0);
    assert!(store.count_by_status(JobStatus::Error).await >= 1);
    assert!(store.count_by_status(JobStatus::Queued).await >= 1);
}

#[tokio::test]
async fn stop_closes_out_jobs_that_never_ran() {
    let jobs = (0..3).map(|_| Job::new("slice-len", None));
    let store = Arc::new(MemoryJobStore::with_jobs(jobs).await);
    let started = Arc::new(tokio::sync::Notify::new());
    let release = Arc::new(tokio::sync::Notify::new());

    let mut worker = JobWorker::new(WorkerConfig::new("worker_test", 1), store.clone()).unwrap();
    {
        let started = started.clone();
        let release = release.clone();
        worker
            .register_handler(
                "slice-len",
                handler_fn(move |_payload: Option<Vec<u8>>| {
                    let started = started.clone();
                    let release = release.clone();
                    async move {
                        started.notify_one();
                        release.notified().await;
                        Ok::<(), HandlerError>(())
                    }
                }),
                NoOpErrorHandler,
            )
            .unwrap();
    }

    let (running, mut events) = worker.run_with_events(16);
    assert_eq!(running.notify().await.unwrap().dispatched, 3);
    started.notified().await;

    let stopping = tokio::spawn(running.stop());
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_one();
    tokio::time::timeout(Duration::from_secs(2), stopping)
        .await
        .expect("stop completes once the running job returns")
        .unwrap();

    // the job in flight completes; the two behind it never run
    assert_eq!(status_of(&store, 1).await, JobStatus::Finished);
    assert_eq!(status_of(&store, 2).await, JobStatus::Error);
    assert_eq!(status_of(&store, 3).await, JobStatus::Error);

    let mut abandoned = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let JobEvent::Completed {
            job_id,
            status: JobStatus::Error,
            error,
            ..
        } = event
        {
            assert_eq!(error.as_deref(), Some(ABANDONED_MESSAGE));
            abandoned.push(job_id);
        }
    }
    abandoned.sort();
    assert_eq!(abandoned, vec![JobId::new(2), JobId::new(3)]);
}

#[test]
fn invalid_config_is_rejected() {
    let store = Arc::new(MemoryJobStore::new());
    assert!(matches!(
        JobWorker::new(WorkerConfig::new("worker_test", 0), store),
        Err(WorkerError::Validation(_))
    ));
}
