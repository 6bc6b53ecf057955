use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::jobs::store::{JobStore, StoreError};

/// Periodic sweep moving due delayed jobs into the ready queue.
///
/// Idempotent by construction: `promote_due` only moves jobs whose due time
/// has passed, and a promoted job cannot be promoted again. Runs
/// independently of worker pace; co-locating it with workers just lowers
/// promotion latency.
pub struct Promoter {
    store: Arc<dyn JobStore>,
    interval: Duration,
    batch_limit: usize,
}

impl Promoter {
    pub fn new(store: Arc<dyn JobStore>, interval: Duration, batch_limit: usize) -> Self {
        Self {
            store,
            interval,
            batch_limit: batch_limit.max(1),
        }
    }

    /// One sweep. The batch limit bounds work per tick; a backlog larger
    /// than the limit drains over the following ticks.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let moved = self.store.promote_due(self.batch_limit).await?;
        if moved > 0 {
            debug!(moved, "promoted due jobs");
        }
        Ok(moved)
    }

    /// Run forever on the configured cadence. Store errors are logged and
    /// retried on the next tick rather than crashing the task.
    pub async fn run(&self) {
        loop {
            if let Err(e) = self.tick().await {
                warn!(error = %e, "promoter sweep failed, will retry next tick");
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
