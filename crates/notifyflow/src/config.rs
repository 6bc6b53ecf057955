use std::time::Duration;

use crate::jobs::retry::RetryConfig;
use crate::jobs::runner::RunnerOptions;

/// Runtime configuration, loaded once at startup from environment variables
/// (with `.env` support). Every knob has a default; only nonsensical values
/// are rejected.
#[derive(Clone, Debug)]
pub struct Config {
    pub worker_id: String,

    /// Attempt budget per job (>= 1).
    pub max_attempts: i32,
    pub base_backoff_ms: i64,
    pub max_backoff_ms: i64,
    pub backoff_jitter_pct: f64,

    pub promote_interval_ms: u64,
    pub promote_batch_limit: usize,
    pub idle_poll_interval_ms: u64,
    pub store_retry_delay_ms: u64,

    /// Independent worker loops sharing the store. Isolation against
    /// head-of-line blocking comes from running more loops, not from
    /// per-job timeouts.
    pub worker_concurrency: usize,

    pub admin_addr: Option<String>,
    pub verbose_job_logs: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let worker_id = env_or_fallback("NFLOW_WORKER_ID", "WORKER_ID")
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "worker-1".to_string());

        let max_attempts: i32 = env_or_fallback("NFLOW_MAX_ATTEMPTS", "MAX_ATTEMPTS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        if max_attempts < 1 {
            anyhow::bail!("NFLOW_MAX_ATTEMPTS must be >= 1, got {max_attempts}");
        }

        let base_backoff_ms: i64 = env_or_fallback("NFLOW_BASE_BACKOFF_MS", "BASE_BACKOFF_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(2_000);
        if base_backoff_ms <= 0 {
            anyhow::bail!("NFLOW_BASE_BACKOFF_MS must be > 0, got {base_backoff_ms}");
        }

        let max_backoff_ms: i64 = std::env::var("NFLOW_MAX_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15 * 60 * 1_000)
            .max(base_backoff_ms);

        let backoff_jitter_pct: f64 = std::env::var("NFLOW_BACKOFF_JITTER_PCT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0f64)
            .clamp(0.0, 1.0);

        let promote_interval_ms: u64 = std::env::var("NFLOW_PROMOTE_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        let promote_batch_limit: usize = std::env::var("NFLOW_PROMOTE_BATCH_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100)
            .clamp(1, 10_000);

        let idle_poll_interval_ms: u64 = std::env::var("NFLOW_IDLE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(250);

        let store_retry_delay_ms: u64 = std::env::var("NFLOW_STORE_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let worker_concurrency: usize = std::env::var("NFLOW_WORKER_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2)
            .clamp(1, 64);

        let admin_addr = env_or_fallback("NFLOW_ADMIN_ADDR", "ADMIN_ADDR")
            .and_then(|s| normalize_optional_addr(&s));

        let verbose_job_logs = env_bool("NFLOW_VERBOSE_JOB_LOGS").unwrap_or(false);

        Ok(Self {
            worker_id,
            max_attempts,
            base_backoff_ms,
            max_backoff_ms,
            backoff_jitter_pct,
            promote_interval_ms,
            promote_batch_limit,
            idle_poll_interval_ms,
            store_retry_delay_ms,
            worker_concurrency,
            admin_addr,
            verbose_job_logs,
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            base_ms: self.base_backoff_ms,
            max_ms: self.max_backoff_ms,
            jitter_pct: self.backoff_jitter_pct,
        }
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            // Worker loops promote a small slice per iteration; bulk
            // promotion is the Promoter task's job.
            promote_batch_limit: self.promote_batch_limit.min(10),
            idle_poll_interval: Duration::from_millis(self.idle_poll_interval_ms),
            store_retry_delay: Duration::from_millis(self.store_retry_delay_ms),
            verbose_job_logs: self.verbose_job_logs,
        }
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}
