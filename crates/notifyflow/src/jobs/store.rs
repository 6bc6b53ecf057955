use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::model::{DeadLetterEntry, Job, JobStatus, NewJob};

/// Errors surfaced by a job store backend.
///
/// The in-memory store is infallible in practice, but the contract is
/// fallible so that file-backed or remote implementations can report
/// outages. Callers inside the promoter and worker loops treat any
/// `StoreError` as transient: log, back off briefly, try the store again.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store backend is unavailable: {0}")]
    Unavailable(String),

    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Counts of jobs per collection, plus how many delayed jobs are already due.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreDepths {
    pub ready: usize,
    pub delayed: usize,
    pub dead: usize,
    pub due_now: usize,
}

/// The shared queue state behind atomic primitives.
///
/// All three collections (ready, delayed, dead-letter) live behind this one
/// interface; the promoter and worker loops are injected with it and never
/// touch queue state any other way. Every method is atomic with respect to
/// concurrent callers.
///
/// There is no "processing" state: `dequeue_ready` removes the job, and it
/// only reappears (delayed or dead) if the caller settles a failure. A worker
/// crashing between dequeue and settle therefore loses the job. A hardened
/// store can layer a visibility timeout on top of this contract; the minimal
/// contract does not require one.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Admit a job. `visible_at <= now` lands in ready, otherwise delayed.
    /// Returns immediately; never blocks on processing.
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, StoreError>;

    /// Pop the head of the ready queue (FIFO), or `None` when empty.
    /// Under concurrent callers a given job is returned to exactly one.
    async fn dequeue_ready(&self) -> Result<Option<Job>, StoreError>;

    /// Re-admit a job that already exists (a retry), preserving its id,
    /// attempt count, and original `enqueued_at`. Routes on `visible_at`
    /// like `enqueue`; callers set `visible_at` in the future when parking
    /// a job for backoff.
    async fn reschedule(&self, job: Job) -> Result<(), StoreError>;

    /// Move up to `limit` delayed jobs whose `visible_at` has passed into
    /// ready, in due-time order. Returns how many moved. Idempotent: a job
    /// cannot be promoted twice, and a second immediate call moves nothing
    /// new.
    async fn promote_due(&self, limit: usize) -> Result<usize, StoreError>;

    /// Remove the job from whichever collection holds it (if any) and append
    /// a dead-letter entry recording the final attempt count and reason.
    async fn dead_letter(
        &self,
        job: Job,
        reason_code: &str,
        reason: &str,
    ) -> Result<(), StoreError>;

    /// Read-only listing over the dead-letter collection, oldest first.
    async fn list_dead(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError>;

    /// Which collection currently holds the job, if any. A job being
    /// processed (dequeued, not yet settled) reports `None`, same as one
    /// that finished successfully.
    async fn status_of(&self, id: Uuid) -> Result<Option<JobStatus>, StoreError>;

    /// Depth snapshot for metrics and operator tooling.
    async fn depths(&self) -> Result<StoreDepths, StoreError>;
}
