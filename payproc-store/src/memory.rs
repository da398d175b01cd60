//! In-memory storage adapters.
//!
//! Process-local implementations of the storage ports, used for
//! development and tests. State does not survive a restart.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use uuid::Uuid;

use payproc_types::{
    CardActivity, CounterError, CounterStore, FraudReport, StoreError, Transaction,
    TransactionStore, VerdictStore,
};

/// Transaction and verdict storage backed by process memory.
#[derive(Default)]
pub struct MemoryDatabase {
    // Keyed by idempotency key; the map entry lock is what resolves
    // concurrent saves with the same key to a single winner.
    transactions: DashMap<Uuid, Transaction>,
    verdicts: RwLock<Vec<FraudReport>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryDatabase {
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
        match self.transactions.entry(tx.idempotency_key) {
            Entry::Occupied(_) => Err(StoreError::DuplicateIdempotencyKey),
            Entry::Vacant(slot) => {
                slot.insert(tx.clone());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl VerdictStore for MemoryDatabase {
    async fn record(&self, report: &FraudReport) -> Result<(), StoreError> {
        self.verdicts
            .write()
            .expect("verdict lock poisoned")
            .push(report.clone());
        Ok(())
    }

    async fn recent_fraudulent(&self, limit: u32) -> Result<Vec<FraudReport>, StoreError> {
        let verdicts = self.verdicts.read().expect("verdict lock poisoned");
        let mut fraudulent: Vec<FraudReport> = verdicts
            .iter()
            .filter(|r| r.is_fraudulent)
            .cloned()
            .collect();
        fraudulent.sort_by(|a, b| b.evaluated_at.cmp(&a.evaluated_at));
        fraudulent.truncate(limit as usize);
        Ok(fraudulent)
    }

    async fn top_card_fingerprints(&self, limit: u32) -> Result<Vec<CardActivity>, StoreError> {
        let verdicts = self.verdicts.read().expect("verdict lock poisoned");
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for report in verdicts.iter() {
            *counts.entry(report.card_fingerprint.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<CardActivity> = counts
            .into_iter()
            .map(|(card_fingerprint, transaction_count)| CardActivity {
                card_fingerprint: card_fingerprint.to_string(),
                transaction_count,
            })
            .collect();
        // Tie-break on the fingerprint so the order is stable.
        ranked.sort_by(|a, b| {
            b.transaction_count
                .cmp(&a.transaction_count)
                .then_with(|| a.card_fingerprint.cmp(&b.card_fingerprint))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}

struct Window {
    count: u64,
    expires_at: Instant,
}

/// Fixed-window counters backed by process memory.
#[derive(Default)]
pub struct MemoryCounters {
    counters: DashMap<String, Window>,
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn tracked_identities(&self) -> usize {
        self.counters.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounters {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let now = Instant::now();
        let count = {
            let mut entry = self
                .counters
                .entry(key.to_string())
                .or_insert_with(|| Window {
                    count: 0,
                    expires_at: now + window,
                });
            if now >= entry.expires_at {
                // The previous window lapsed; this increment starts a new one.
                entry.count = 0;
                entry.expires_at = now + window;
            }
            entry.count += 1;
            entry.count
        };
        // Identities never seen again would otherwise accumulate; sweep
        // lapsed windows when a new one starts. Entry guard is released
        // above so the sweep cannot deadlock on a shard lock.
        if count == 1 {
            self.counters.retain(|_, w| now < w.expires_at);
        }
        Ok(count)
    }
}
