use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use notifyflow::jobs::{
    BookingLookup, BookingRecord, JobContext, JobStore, LookupError, MemoryStore, NewJob,
    Transport, TransportError,
};

pub fn new_store() -> Arc<dyn JobStore> {
    Arc::new(MemoryStore::new())
}

#[allow(dead_code)]
pub async fn enqueue_now(store: &Arc<dyn JobStore>, job_type: &str, max_attempts: i32) -> uuid::Uuid {
    store
        .enqueue(NewJob::now(job_type, json!({}), max_attempts))
        .await
        .expect("enqueue failed")
}

/// Transport that fails its first `failures` sends, then succeeds. Counts
/// every call.
#[derive(Debug)]
pub struct FailNTransport {
    remaining: AtomicUsize,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FailNTransport {
    pub fn failing(failures: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FailNTransport {
    async fn send(&self, _destination: &str, _message: &str) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

/// Directory with nothing in it.
#[derive(Debug, Default)]
pub struct EmptyDirectory;

#[async_trait]
impl BookingLookup for EmptyDirectory {
    async fn resolve(&self, booking_id: &str) -> Result<BookingRecord, LookupError> {
        Err(LookupError::NotFound(booking_id.to_string()))
    }
}

#[allow(dead_code)]
pub fn test_ctx(transport: Arc<dyn Transport>) -> JobContext {
    JobContext {
        transport,
        bookings: Arc::new(EmptyDirectory),
        worker_id: "test-worker".to_string(),
    }
}
