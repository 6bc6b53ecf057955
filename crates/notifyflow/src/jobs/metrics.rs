use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jobs::store::{JobStore, StoreError};

/// Point-in-time queue health for operators.
#[derive(Debug, Serialize)]
pub struct Metrics {
    pub at: DateTime<Utc>,

    pub ready_depth: usize,
    pub delayed_depth: usize,
    /// Delayed jobs already past due, i.e. waiting on the next promoter tick.
    pub due_now: usize,
    pub dead_depth: usize,
}

pub async fn snapshot(store: &dyn JobStore) -> Result<Metrics, StoreError> {
    let depths = store.depths().await?;
    Ok(Metrics {
        at: Utc::now(),
        ready_depth: depths.ready,
        delayed_depth: depths.delayed,
        due_now: depths.due_now,
        dead_depth: depths.dead,
    })
}
