mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{new_store, test_ctx, FailNTransport};
use serde_json::json;
use uuid::Uuid;

use notifyflow::jobs::retry::RetryConfig;
use notifyflow::jobs::runner::{JobRunner, RunnerOptions, Tick};
use notifyflow::jobs::{
    boxed, DeadLetterEntry, HandlerRegistry, Job, JobError, JobStatus, JobStore, MemoryStore,
    NewJob, StoreDepths, StoreError, TransportError,
};

fn fast_runner_options() -> RunnerOptions {
    RunnerOptions {
        promote_batch_limit: 10,
        idle_poll_interval: Duration::from_millis(10),
        store_retry_delay: Duration::from_millis(20),
        verbose_job_logs: false,
    }
}

fn transport_code(e: &TransportError) -> &'static str {
    match e {
        TransportError::Unavailable(_) => "TRANSPORT",
        TransportError::RateLimited => "RATE_LIMIT",
        TransportError::Rejected(_) => "BAD_PAYLOAD",
    }
}

/// Registry with one handler that records the attempt number of every
/// invocation and forwards to the context transport.
fn recording_registry(attempts_seen: Arc<Mutex<Vec<i32>>>) -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register("booking-confirmation", move |job, ctx| {
        let attempts_seen = attempts_seen.clone();
        boxed(async move {
            attempts_seen.lock().unwrap().push(job.attempts + 1);
            ctx.transport
                .send("guest@example.com", "your booking is confirmed")
                .await
                .map_err(|e| JobError::new(transport_code(&e), e.to_string()))
        })
    });
    Arc::new(registry)
}

/// Step the runner until ready and delayed are both empty.
async fn drain(runner: &JobRunner, store: &Arc<dyn JobStore>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let tick = runner.run_once().await.expect("store should be healthy");
        let depths = store.depths().await.unwrap();
        if depths.ready == 0 && depths.delayed == 0 {
            return;
        }
        if tick == Tick::Idle {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "queue did not drain in time"
        );
    }
}

#[tokio::test]
async fn transient_failures_retry_then_succeed() {
    let store = new_store();
    let transport = Arc::new(FailNTransport::failing(2));
    let attempts_seen = Arc::new(Mutex::new(Vec::new()));

    let runner = JobRunner::new(
        store.clone(),
        recording_registry(attempts_seen.clone()),
        test_ctx(transport.clone()),
        RetryConfig {
            base_ms: 50,
            max_ms: 5_000,
            jitter_pct: 0.0,
        },
        fast_runner_options(),
    );

    store
        .enqueue(NewJob::now(
            "booking-confirmation",
            json!({"bookingId": "B1"}),
            5,
        ))
        .await
        .unwrap();

    drain(&runner, &store).await;

    // Two transport outages, success on the third attempt.
    assert_eq!(transport.calls(), 3);
    assert_eq!(*attempts_seen.lock().unwrap(), vec![1, 2, 3]);

    // Success leaves no trace anywhere.
    let depths = store.depths().await.unwrap();
    assert_eq!(depths.ready, 0);
    assert_eq!(depths.delayed, 0);
    assert_eq!(depths.dead, 0);
}

#[tokio::test]
async fn unknown_job_type_dead_letters_through_the_loop() {
    let store = new_store();
    let runner = JobRunner::new(
        store.clone(),
        recording_registry(Arc::new(Mutex::new(Vec::new()))),
        test_ctx(Arc::new(FailNTransport::failing(0))),
        RetryConfig::default(),
        fast_runner_options(),
    );

    store
        .enqueue(NewJob::now("password-reset", json!({}), 5))
        .await
        .unwrap();

    assert_eq!(runner.run_once().await.unwrap(), Tick::Processed);

    let dead = store.list_dead(10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].reason_code, "NON_RETRYABLE");
    assert_eq!(dead[0].job.attempts, 1);
    assert!(dead[0].reason.contains("UNKNOWN_JOB_TYPE"));
}

/// Delegates to a real store but fails scripted numbers of calls, to prove
/// the loops survive backend outages.
struct FlakyStore {
    inner: MemoryStore,
    failing_dequeues: AtomicUsize,
    failing_reschedules: AtomicUsize,
}

impl FlakyStore {
    fn new(failing_dequeues: usize, failing_reschedules: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_dequeues: AtomicUsize::new(failing_dequeues),
            failing_reschedules: AtomicUsize::new(failing_reschedules),
        }
    }

    fn outage(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, StoreError> {
        self.inner.enqueue(job).await
    }

    async fn reschedule(&self, job: Job) -> Result<(), StoreError> {
        if Self::outage(&self.failing_reschedules) {
            return Err(StoreError::Unavailable("reschedule outage".to_string()));
        }
        self.inner.reschedule(job).await
    }

    async fn dequeue_ready(&self) -> Result<Option<Job>, StoreError> {
        if Self::outage(&self.failing_dequeues) {
            return Err(StoreError::Unavailable("dequeue outage".to_string()));
        }
        self.inner.dequeue_ready().await
    }

    async fn promote_due(&self, limit: usize) -> Result<usize, StoreError> {
        self.inner.promote_due(limit).await
    }

    async fn dead_letter(
        &self,
        job: Job,
        reason_code: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        self.inner.dead_letter(job, reason_code, reason).await
    }

    async fn list_dead(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        self.inner.list_dead(limit).await
    }

    async fn status_of(&self, id: Uuid) -> Result<Option<JobStatus>, StoreError> {
        self.inner.status_of(id).await
    }

    async fn depths(&self) -> Result<StoreDepths, StoreError> {
        self.inner.depths().await
    }
}

#[tokio::test]
async fn store_outage_during_settle_does_not_drop_the_job() {
    let store: Arc<dyn JobStore> = Arc::new(FlakyStore::new(0, 2));
    let runner = JobRunner::new(
        store.clone(),
        Arc::new(HandlerRegistry::new()),
        test_ctx(Arc::new(FailNTransport::failing(0))),
        RetryConfig {
            base_ms: 20,
            max_ms: 1_000,
            jitter_pct: 0.0,
        },
        fast_runner_options(),
    );

    store
        .enqueue(NewJob::now("notify", json!({}), 5))
        .await
        .unwrap();
    let job = store.dequeue_ready().await.unwrap().unwrap();

    // The first two reschedule writes fail; on_failure must keep retrying
    // the store until the job is safely parked.
    runner.on_failure(job, "TIMEOUT", "slow provider").await;

    let depths = store.depths().await.unwrap();
    assert_eq!(depths.delayed, 1);
    assert_eq!(depths.dead, 0);
}

#[tokio::test]
async fn store_outage_on_dequeue_surfaces_without_panicking() {
    let store: Arc<dyn JobStore> = Arc::new(FlakyStore::new(2, 0));
    let runner = JobRunner::new(
        store.clone(),
        recording_registry(Arc::new(Mutex::new(Vec::new()))),
        test_ctx(Arc::new(FailNTransport::failing(0))),
        RetryConfig::default(),
        fast_runner_options(),
    );

    store
        .enqueue(NewJob::now("booking-confirmation", json!({}), 5))
        .await
        .unwrap();

    assert!(runner.run_once().await.is_err());
    assert!(runner.run_once().await.is_err());
    // Store recovered: the job processes normally.
    assert_eq!(runner.run_once().await.unwrap(), Tick::Processed);
}
