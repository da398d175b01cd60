//! Counter-store port trait.

use std::time::Duration;

use crate::error::CounterError;

/// Atomic increment-with-expiry counters, the only cross-request shared
/// state in the system.
///
/// Both the rate admission guard (keyed by client IP) and the frequency
/// fraud rule (keyed by card fingerprint) build on this single
/// fixed-window primitive.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically increments the counter for `key` and returns the
    /// post-increment count.
    ///
    /// The increment that creates the counter (count becomes 1) starts
    /// a new window: the counter expires `window` later, after which the
    /// next increment starts over at 1. Expiry is time-driven; there is
    /// no explicit delete.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterError>;
}
