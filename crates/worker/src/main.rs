use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use notifyflow::api;
use notifyflow::config::Config;
use notifyflow::jobs::{JobContext, JobRunner, JobStore, MemoryStore, Promoter};

use worker::handlers::{build_registry, ConsoleTransport, StaticBookingDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env()?;

    info!(
        worker_id = %cfg.worker_id,
        max_attempts = cfg.max_attempts,
        base_backoff_ms = cfg.base_backoff_ms,
        promote_interval_ms = cfg.promote_interval_ms,
        promote_batch_limit = cfg.promote_batch_limit,
        idle_poll_interval_ms = cfg.idle_poll_interval_ms,
        worker_concurrency = cfg.worker_concurrency,
        admin_addr = %cfg.admin_addr.clone().unwrap_or_else(|| "disabled".to_string()),
        "notifyflow worker starting"
    );

    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let registry = build_registry();
    info!(job_types = ?registry.job_types(), "handlers registered");

    let transport = Arc::new(ConsoleTransport);
    let bookings = Arc::new(StaticBookingDirectory::with_demo_data());

    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

    // ---- Admin API task ----
    let api_addr = cfg.admin_addr.clone();
    let api_state = api::ApiState {
        store: store.clone(),
        default_max_attempts: cfg.max_attempts,
    };
    tasks.spawn(async move {
        if let Some(addr) = api_addr {
            let app = api::router(api_state);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(%addr, "admin api listening");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok(())
    });

    // ---- Promoter task ----
    let promoter = Promoter::new(
        store.clone(),
        Duration::from_millis(cfg.promote_interval_ms),
        cfg.promote_batch_limit,
    );
    tasks.spawn(async move {
        promoter.run().await;
        Ok(())
    });

    // ---- Worker loop tasks ----
    for i in 1..=cfg.worker_concurrency {
        let ctx = JobContext {
            transport: transport.clone(),
            bookings: bookings.clone(),
            worker_id: format!("{}-{}", cfg.worker_id, i),
        };
        let runner = JobRunner::new(
            store.clone(),
            registry.clone(),
            ctx,
            cfg.retry_config(),
            cfg.runner_options(),
        );
        tasks.spawn(async move {
            runner.run().await;
            Ok(())
        });
    }

    // Every task loops forever; any completion is a failure.
    if let Some(res) = tasks.join_next().await {
        res??;
        anyhow::bail!("a background task exited unexpectedly");
    }

    Ok(())
}
