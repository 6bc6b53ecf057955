use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use notifyflow::jobs::error_codes::suggested_action;
use notifyflow::jobs::retry::RetryConfig;
use notifyflow::jobs::{
    JobContext, JobRunner, JobStore, MemoryStore, NewJob, RunnerOptions, Tick, Transport,
    TransportError,
};
use worker::handlers::{build_registry, job_types, ConsoleTransport, StaticBookingDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "notifyctl <command>\n\
             Commands:\n\
             - demo        enqueue one notification, fail twice, succeed on the third attempt\n\
             - seed <n>    enqueue n notifications and drain them\n\
             - dlq-demo    drive jobs into the dead-letter queue and print it\n"
        );
        std::process::exit(2);
    }

    match args[1].as_str() {
        "demo" => demo().await?,
        "seed" => {
            let n: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(n).await?;
        }
        "dlq-demo" => dlq_demo().await?,
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Fails the first `failures` sends, then delivers like the console
/// transport. Counts every send call.
struct ScriptedTransport {
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, destination: &str, message: &str) -> Result<(), TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            println!("  attempt {call}: transport unavailable (simulated)");
            return Err(TransportError::Unavailable("simulated outage".to_string()));
        }
        println!("  attempt {call}: sent to {destination}: {message}");
        Ok(())
    }
}

fn runner_for(
    store: Arc<dyn JobStore>,
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
) -> JobRunner {
    let ctx = JobContext {
        transport,
        bookings: Arc::new(StaticBookingDirectory::with_demo_data()),
        worker_id: "notifyctl".to_string(),
    };
    JobRunner::new(
        store,
        build_registry(),
        ctx,
        retry,
        RunnerOptions {
            promote_batch_limit: 10,
            idle_poll_interval: Duration::from_millis(25),
            store_retry_delay: Duration::from_millis(50),
            verbose_job_logs: false,
        },
    )
}

/// Step the runner until both live collections are empty.
async fn drain(runner: &JobRunner, store: &Arc<dyn JobStore>) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let tick = runner.run_once().await?;
        let depths = store.depths().await?;
        if depths.ready == 0 && depths.delayed == 0 {
            return Ok(());
        }
        if tick == Tick::Idle {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("queue did not drain within 30s");
        }
    }
}

async fn demo() -> anyhow::Result<()> {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let transport = Arc::new(ScriptedTransport::failing(2));
    let retry = RetryConfig {
        base_ms: 200,
        max_ms: 5_000,
        jitter_pct: 0.0,
    };
    let runner = runner_for(store.clone(), transport.clone(), retry);

    println!("enqueue booking-confirmation for booking B1 (transport fails twice)");
    store
        .enqueue(NewJob::now(
            job_types::BOOKING_CONFIRMATION,
            json!({"booking_id": "B1"}),
            5,
        ))
        .await?;

    drain(&runner, &store).await?;

    let depths = store.depths().await?;
    println!(
        "done: {} send attempts, dead-letter depth {}",
        transport.calls(),
        depths.dead
    );
    Ok(())
}

async fn seed(n: usize) -> anyhow::Result<()> {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let runner = runner_for(
        store.clone(),
        Arc::new(ConsoleTransport),
        RetryConfig::default(),
    );

    for i in 0..n {
        let booking_id = if i % 2 == 0 { "B1" } else { "B2" };
        let new = match i % 3 {
            0 => NewJob::now(
                job_types::BOOKING_CONFIRMATION,
                json!({"booking_id": booking_id}),
                5,
            ),
            1 => NewJob::now(
                job_types::PAYMENT_CONFIRMATION,
                json!({"booking_id": booking_id, "amount_cents": 19900, "currency": "USD"}),
                5,
            ),
            // Stagger a few through the delayed set to exercise promotion.
            _ => NewJob::after_ms(
                job_types::PAYMENT_FAILED,
                json!({"booking_id": booking_id, "amount_cents": 4500, "currency": "USD"}),
                200,
                5,
            ),
        };
        store.enqueue(new).await?;
    }

    println!("seeded {n} jobs");
    drain(&runner, &store).await?;

    let depths = store.depths().await?;
    println!(
        "drained: ready={} delayed={} dead={}",
        depths.ready, depths.delayed, depths.dead
    );
    Ok(())
}

async fn dlq_demo() -> anyhow::Result<()> {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    // Transport that never recovers: retryable failures until the budget
    // runs out.
    let transport = Arc::new(ScriptedTransport::failing(usize::MAX));
    let retry = RetryConfig {
        base_ms: 50,
        max_ms: 1_000,
        jitter_pct: 0.0,
    };
    let runner = runner_for(store.clone(), transport, retry);

    println!("enqueue a job with no registered handler (dead-letters immediately)");
    store
        .enqueue(NewJob::now("password-reset", json!({"user": "u1"}), 5))
        .await?;

    println!("enqueue booking-confirmation against a dead transport (max_attempts=2)");
    store
        .enqueue(NewJob::now(
            job_types::BOOKING_CONFIRMATION,
            json!({"booking_id": "B1"}),
            2,
        ))
        .await?;

    drain(&runner, &store).await?;

    println!("\n=== DEAD LETTERS ===");
    for entry in store.list_dead(100).await? {
        let code = entry
            .job
            .last_error_code
            .as_deref()
            .unwrap_or("UNKNOWN")
            .to_string();
        println!(
            "{} type={} attempts={} reason_code={} reason={}",
            entry.job.id, entry.job.job_type, entry.job.attempts, entry.reason_code, entry.reason
        );
        println!("  suggested action: {}", suggested_action(&code));
    }
    Ok(())
}
