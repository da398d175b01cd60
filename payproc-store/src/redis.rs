//! Redis fixed-window counters.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use payproc_types::{CounterError, CounterStore};

/// Fixed-window counters backed by Redis INCR + EXPIRE.
///
/// Shared across processes, so every analyzer replica observes the
/// same per-card counts.
pub struct RedisCounters {
    client: redis::Client,
}

impl RedisCounters {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CounterStore for RedisCounters {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;

        let count: u64 = conn
            .incr(key, 1u64)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;

        // The increment that created the key also starts its window.
        if count == 1 {
            let _: bool = conn
                .expire(key, window.as_secs() as i64)
                .await
                .map_err(|e| CounterError::Unavailable(e.to_string()))?;
        }

        Ok(count)
    }
}
