use std::{collections::HashMap, pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::Semaphore, time::timeout};

use crate::jobs::model::Job;

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
type HandlerFn = dyn for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<(), JobError>>
    + Send
    + Sync;

/// Failure reported by a dispatch handler. `code` feeds error classification
/// (retry vs dead-letter); `message` is recorded on the job.
#[derive(Debug)]
pub struct JobError {
    pub code: &'static str,
    pub message: String,
}

impl JobError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("message rejected: {0}")]
    Rejected(String),
}

/// The external messaging provider. The queue core never looks inside a
/// send; it only cares about success or failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("booking not found: {0}")]
    NotFound(String),

    #[error("record store unreachable: {0}")]
    Unavailable(String),
}

/// Domain fields a handler needs to render a notification when the payload
/// carries only a booking id.
#[derive(Debug, Clone)]
pub struct BookingRecord {
    pub booking_id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub property_name: String,
    pub check_in: String,
}

/// Resolves a payload's foreign key into renderable fields. Failure to
/// resolve is a dispatch failure like any other.
#[async_trait]
pub trait BookingLookup: Send + Sync {
    async fn resolve(&self, booking_id: &str) -> Result<BookingRecord, LookupError>;
}

/// Everything a handler may touch besides the job itself.
#[derive(Clone)]
pub struct JobContext {
    pub transport: Arc<dyn Transport>,
    pub bookings: Arc<dyn BookingLookup>,
    pub worker_id: String,
}

#[derive(Clone)]
pub struct HandlerEntry {
    handler: Arc<HandlerFn>,
    semaphore: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
}

/// Maps `job_type` to handler logic. Built once at startup, shared by all
/// worker loops.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct HandlerOptions {
    max_concurrency: Option<usize>,
    timeout: Option<Duration>,
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, job_type: &str, handler: F)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<(), JobError>>
            + Send
            + Sync
            + 'static,
    {
        self.register_with_options(job_type, handler, HandlerOptions::new());
    }

    pub fn register_with_options<F>(&mut self, job_type: &str, handler: F, opts: HandlerOptions)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<(), JobError>>
            + Send
            + Sync
            + 'static,
    {
        let semaphore = opts
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        self.handlers.insert(
            job_type.to_string(),
            HandlerEntry {
                handler: Arc::new(handler),
                semaphore,
                timeout: opts.timeout,
            },
        );
    }

    pub fn handler_for(&self, job_type: &str) -> Option<HandlerEntry> {
        self.handlers.get(job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl HandlerEntry {
    pub async fn run(&self, job: &Job, ctx: &JobContext) -> Result<(), JobError> {
        let _permit = if let Some(sem) = &self.semaphore {
            Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| JobError::new("WORKER_SHUTDOWN", "handler semaphore closed"))?,
            )
        } else {
            None
        };

        let fut = (self.handler)(job, ctx);
        if let Some(dur) = self.timeout {
            match timeout(dur, fut).await {
                Ok(inner) => inner,
                Err(_) => Err(JobError::new(
                    "TIMEOUT",
                    format!("handler timeout after {}ms", dur.as_millis()),
                )),
            }
        } else {
            fut.await
        }
    }
}

/// Boxing helper so closures can be registered without writing `Box::pin`
/// at every call site.
pub fn boxed<'a, T>(fut: impl std::future::Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}
