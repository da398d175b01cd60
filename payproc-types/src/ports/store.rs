//! Storage port traits.
//!
//! Adapters (Postgres, SQLite, InMemory) implement these against their
//! backing store.

use crate::domain::{CardActivity, FraudReport, Transaction};
use crate::error::StoreError;

/// Durable store for accepted transactions.
#[async_trait::async_trait]
pub trait TransactionStore: Send + Sync + 'static {
    /// Persists a transaction, enforcing idempotency-key uniqueness
    /// atomically at the storage layer.
    ///
    /// Returns [`StoreError::DuplicateIdempotencyKey`] when a row with
    /// the same key already exists; concurrent saves with the same key
    /// must resolve so that exactly one succeeds.
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError>;
}

/// Append-only analytical store for fraud verdicts.
#[async_trait::async_trait]
pub trait VerdictStore: Send + Sync + 'static {
    /// Appends one verdict row. Rows are never updated or deleted.
    async fn record(&self, report: &FraudReport) -> Result<(), StoreError>;

    /// Most recent fraudulent verdicts, newest first.
    async fn recent_fraudulent(&self, limit: u32) -> Result<Vec<FraudReport>, StoreError>;

    /// Card fingerprints ranked by evaluated-transaction count,
    /// busiest first.
    async fn top_card_fingerprints(&self, limit: u32) -> Result<Vec<CardActivity>, StoreError>;
}
