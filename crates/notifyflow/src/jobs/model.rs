use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: Value,

    /// Processing attempts already made. Starts at 0 and only goes up.
    pub attempts: i32,
    pub max_attempts: i32,

    /// Original admission time, preserved across retries.
    pub enqueued_at: DateTime<Utc>,
    /// The job must not be handed to a worker before this instant.
    pub visible_at: DateTime<Utc>,

    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: Value,
    pub visible_at: DateTime<Utc>,
    pub max_attempts: i32,
}

impl NewJob {
    pub fn now(job_type: &str, payload: Value, max_attempts: i32) -> Self {
        Self {
            job_type: job_type.to_string(),
            payload,
            visible_at: Utc::now(),
            max_attempts,
        }
    }

    pub fn after_ms(job_type: &str, payload: Value, delay_ms: i64, max_attempts: i32) -> Self {
        Self {
            job_type: job_type.to_string(),
            payload,
            visible_at: Utc::now() + chrono::Duration::milliseconds(delay_ms.max(0)),
            max_attempts,
        }
    }
}

/// Which collection a job currently lives in. Derived, never stored on the
/// job itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Ready,
    Delayed,
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ready => "ready",
            JobStatus::Delayed => "delayed",
            JobStatus::Dead => "dead",
        }
    }
}

/// Terminal record for a job that exhausted its retry budget or failed a
/// non-retryable way. Append-only; re-admission is an operator action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    /// Machine tag: MAX_ATTEMPTS_EXCEEDED or NON_RETRYABLE.
    pub reason_code: String,
    /// Human description of the final failure.
    pub reason: String,
    pub dead_at: DateTime<Utc>,
}
