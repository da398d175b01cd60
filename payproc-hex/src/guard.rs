//! Rate admission guard in front of ingestion.

use std::sync::Arc;
use std::time::Duration;

use payproc_types::CounterStore;

/// Fixed-window request throttle keyed by client identity.
///
/// Each admit is one atomic counter increment; the increment that
/// creates the counter also starts its window. Fixed windows accept
/// bursts straddling a window boundary - a documented trade-off, not a
/// defect. When the counter backend is unreachable the guard fails
/// open: keeping ingestion available outranks strict throttling.
pub struct RateGuard<C: CounterStore> {
    counters: Arc<C>,
    limit: u64,
    window: Duration,
}

impl<C: CounterStore> RateGuard<C> {
    pub fn new(counters: Arc<C>, limit: u64, window: Duration) -> Self {
        Self {
            counters,
            limit,
            window,
        }
    }

    /// Decides whether a request from `identity` is admitted.
    pub async fn admit(&self, identity: &str) -> bool {
        let key = format!("rate_limit:{identity}");
        match self.counters.increment(&key, self.window).await {
            Ok(count) => count <= self.limit,
            Err(err) => {
                tracing::warn!(identity, error = %err, "counter store unreachable, admitting request");
                true
            }
        }
    }

    /// The configured window, for retry-after hints.
    pub fn window(&self) -> Duration {
        self.window
    }
}
