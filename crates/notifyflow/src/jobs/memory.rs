use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::jobs::model::{DeadLetterEntry, Job, JobStatus, NewJob};
use crate::jobs::store::{JobStore, StoreDepths, StoreError};

/// All three collections under one lock, so each store operation is a single
/// critical section. Delayed jobs are keyed `(visible_at, id)` to keep them
/// ordered by due time while tolerating equal timestamps.
#[derive(Debug, Default)]
struct Collections {
    ready: VecDeque<Job>,
    delayed: BTreeMap<(DateTime<Utc>, Uuid), Job>,
    dead: Vec<DeadLetterEntry>,
}

/// In-memory [`JobStore`].
///
/// Cheap to clone; clones share the same queue state. Suitable for
/// single-process deployments and tests. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: std::sync::Arc<Mutex<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, new: NewJob) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let job = Job {
            id,
            job_type: new.job_type,
            payload: new.payload,
            attempts: 0,
            max_attempts: new.max_attempts.max(1),
            enqueued_at: now,
            visible_at: new.visible_at,
            last_error_code: None,
            last_error_message: None,
        };

        let mut cols = self.inner.lock().await;
        if job.visible_at <= now {
            cols.ready.push_back(job);
        } else {
            cols.delayed.insert((job.visible_at, id), job);
        }
        Ok(id)
    }

    async fn reschedule(&self, job: Job) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut cols = self.inner.lock().await;
        if job.visible_at <= now {
            cols.ready.push_back(job);
        } else {
            cols.delayed.insert((job.visible_at, job.id), job);
        }
        Ok(())
    }

    async fn dequeue_ready(&self) -> Result<Option<Job>, StoreError> {
        let mut cols = self.inner.lock().await;
        Ok(cols.ready.pop_front())
    }

    async fn promote_due(&self, limit: usize) -> Result<usize, StoreError> {
        if limit == 0 {
            return Ok(0);
        }

        let now = Utc::now();
        let mut cols = self.inner.lock().await;

        // BTreeMap iteration is ascending by (visible_at, id), so the keys
        // collected here are the earliest-due jobs.
        let due: Vec<(DateTime<Utc>, Uuid)> = cols
            .delayed
            .keys()
            .take_while(|(visible_at, _)| *visible_at <= now)
            .take(limit)
            .copied()
            .collect();

        for key in &due {
            if let Some(job) = cols.delayed.remove(key) {
                cols.ready.push_back(job);
            }
        }

        Ok(due.len())
    }

    async fn dead_letter(
        &self,
        mut job: Job,
        reason_code: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut cols = self.inner.lock().await;

        // The job normally arrives here already removed by dequeue_ready, but
        // the contract promises it is gone from both live collections.
        cols.ready.retain(|j| j.id != job.id);
        if let Some(key) = cols
            .delayed
            .iter()
            .find(|(_, j)| j.id == job.id)
            .map(|(k, _)| *k)
        {
            cols.delayed.remove(&key);
        }

        job.last_error_message = Some(reason.to_string());
        cols.dead.push(DeadLetterEntry {
            job,
            reason_code: reason_code.to_string(),
            reason: reason.to_string(),
            dead_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_dead(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        let cols = self.inner.lock().await;
        Ok(cols.dead.iter().take(limit).cloned().collect())
    }

    async fn status_of(&self, id: Uuid) -> Result<Option<JobStatus>, StoreError> {
        let cols = self.inner.lock().await;
        if cols.ready.iter().any(|j| j.id == id) {
            return Ok(Some(JobStatus::Ready));
        }
        if cols.delayed.values().any(|j| j.id == id) {
            return Ok(Some(JobStatus::Delayed));
        }
        if cols.dead.iter().any(|e| e.job.id == id) {
            return Ok(Some(JobStatus::Dead));
        }
        Ok(None)
    }

    async fn depths(&self) -> Result<StoreDepths, StoreError> {
        let now = Utc::now();
        let cols = self.inner.lock().await;
        let due_now = cols
            .delayed
            .keys()
            .take_while(|(visible_at, _)| *visible_at <= now)
            .count();
        Ok(StoreDepths {
            ready: cols.ready.len(),
            delayed: cols.delayed.len(),
            dead: cols.dead.len(),
            due_now,
        })
    }
}
