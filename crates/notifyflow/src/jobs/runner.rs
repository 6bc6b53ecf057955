use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info, warn};

use crate::jobs::dispatch::{HandlerRegistry, JobContext, JobError};
use crate::jobs::model::Job;
use crate::jobs::retry::{classify_error, next_delay_ms, ErrorClass, RetryConfig};
use crate::jobs::store::{JobStore, StoreError};

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Batch passed to `promote_due` at the top of each iteration, so delayed
    /// jobs surface even without a separate promoter process.
    pub promote_batch_limit: usize,
    /// Sleep when the ready queue is empty.
    pub idle_poll_interval: Duration,
    /// Sleep before retrying a failed store operation.
    pub store_retry_delay: Duration,
    pub verbose_job_logs: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            promote_batch_limit: 10,
            idle_poll_interval: Duration::from_millis(250),
            store_retry_delay: Duration::from_millis(500),
            verbose_job_logs: false,
        }
    }
}

/// What a single loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Processed,
    Idle,
}

/// One worker loop: promote a small batch, dequeue, dispatch, settle.
///
/// Several runners may share one store; `dequeue_ready` guarantees each job
/// lands in exactly one of them. Dispatch failures never escape the loop —
/// they turn into a reschedule or a dead-letter write. Store failures inside
/// settle are retried until the store recovers, so a failed job is never
/// dropped just because the backend blipped.
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    ctx: JobContext,
    retry_cfg: RetryConfig,
    opts: RunnerOptions,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        ctx: JobContext,
        retry_cfg: RetryConfig,
        opts: RunnerOptions,
    ) -> Self {
        Self {
            store,
            registry,
            ctx,
            retry_cfg,
            opts,
        }
    }

    /// Run forever. Only store-level errors on the read path cause a pause;
    /// everything else keeps the loop moving.
    pub async fn run(&self) {
        loop {
            match self.run_once().await {
                Ok(Tick::Processed) => {}
                Ok(Tick::Idle) => tokio::time::sleep(self.opts.idle_poll_interval).await,
                Err(e) => {
                    warn!(worker_id = %self.ctx.worker_id, error = %e, "store unavailable, backing off");
                    tokio::time::sleep(self.opts.store_retry_delay).await;
                }
            }
        }
    }

    /// One iteration of the loop. Exposed so tests and `notifyctl` can step
    /// the worker deterministically.
    pub async fn run_once(&self) -> Result<Tick, StoreError> {
        self.store.promote_due(self.opts.promote_batch_limit).await?;

        let Some(job) = self.store.dequeue_ready().await? else {
            return Ok(Tick::Idle);
        };

        if self.opts.verbose_job_logs {
            info!(
                worker_id = %self.ctx.worker_id,
                job_id = %job.id,
                job_type = %job.job_type,
                attempt_no = job.attempts + 1,
                "dequeued job"
            );
        }

        let result = match self.registry.handler_for(&job.job_type) {
            Some(entry) => entry.run(&job, &self.ctx).await,
            None => Err(JobError::new(
                "UNKNOWN_JOB_TYPE",
                format!("no handler for job_type={}", job.job_type),
            )),
        };

        match result {
            Ok(()) => self.on_success(job),
            Err(err) => self.on_failure(job, err.code, &err.message).await,
        }

        Ok(Tick::Processed)
    }

    /// A successful attempt still counts against `attempts`; the job is then
    /// discarded, so success leaves no record in the store.
    pub fn on_success(&self, mut job: Job) {
        job.attempts += 1;
        info!(
            worker_id = %self.ctx.worker_id,
            job_id = %job.id,
            job_type = %job.job_type,
            attempt_no = job.attempts,
            "job succeeded"
        );
    }

    /// Decide retry vs dead-letter for a failed attempt.
    ///
    /// The failed attempt is number `attempts + 1`. Retryable errors with
    /// budget left (`attempt_no < max_attempts`) park the job in the delayed
    /// set for `base * 2^(attempt_no - 1)` ms; everything else dead-letters.
    pub async fn on_failure(&self, mut job: Job, error_code: &str, error_message: &str) {
        job.attempts += 1;
        let attempt_no = job.attempts;
        job.last_error_code = Some(error_code.to_string());
        job.last_error_message = Some(error_message.to_string());

        let class = classify_error(error_code);
        let can_retry = class == ErrorClass::Retryable && attempt_no < job.max_attempts;

        if can_retry {
            let mut rng = StdRng::from_entropy();
            let delay_ms = next_delay_ms(attempt_no, &self.retry_cfg, &mut rng);
            job.visible_at = Utc::now() + chrono::Duration::milliseconds(delay_ms);

            warn!(
                worker_id = %self.ctx.worker_id,
                job_id = %job.id,
                job_type = %job.job_type,
                attempt_no,
                error_code,
                delay_ms,
                "job failed, retrying after backoff"
            );

            self.settle_with_store_retry(SettleOp::Reschedule(job)).await;
        } else {
            let reason_code = match class {
                ErrorClass::NonRetryable => "NON_RETRYABLE",
                ErrorClass::Retryable => "MAX_ATTEMPTS_EXCEEDED",
            };
            let reason = format!("{error_code}: {error_message}");

            error!(
                worker_id = %self.ctx.worker_id,
                job_id = %job.id,
                job_type = %job.job_type,
                attempt_no,
                error_code,
                reason_code,
                "job dead-lettered"
            );

            self.settle_with_store_retry(SettleOp::DeadLetter {
                job,
                reason_code,
                reason,
            })
            .await;
        }
    }

    /// Retry the *store operation* (not the job) until it lands, so a store
    /// outage mid-settle never drops a failed job on the floor.
    async fn settle_with_store_retry(&self, op: SettleOp) {
        loop {
            let res = match &op {
                SettleOp::Reschedule(job) => self.store.reschedule(job.clone()).await,
                SettleOp::DeadLetter {
                    job,
                    reason_code,
                    reason,
                } => {
                    self.store
                        .dead_letter(job.clone(), reason_code, reason)
                        .await
                }
            };
            match res {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        worker_id = %self.ctx.worker_id,
                        error = %e,
                        "store write failed while settling job, retrying"
                    );
                    tokio::time::sleep(self.opts.store_retry_delay).await;
                }
            }
        }
    }
}

enum SettleOp {
    Reschedule(Job),
    DeadLetter {
        job: Job,
        reason_code: &'static str,
        reason: String,
    },
}
