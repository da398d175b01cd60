//! Transaction ingestion service.
//!
//! Orchestrates the create-transaction flow through the storage and bus
//! ports. Contains no infrastructure logic; the adapters are injected at
//! compile time.

use std::sync::Arc;

use uuid::Uuid;

use payproc_types::{
    AppError, CardNumber, DomainError, EventBus, Transaction, TransactionCreatedEvent,
    TransactionStore,
};

/// Application service for transaction ingestion.
///
/// Generic over the storage and bus ports, so tests run it against
/// in-memory fakes and the binaries against Postgres and Kafka.
pub struct IngestionService<S: TransactionStore, B: EventBus> {
    store: Arc<S>,
    bus: Arc<B>,
    topic: String,
}

impl<S: TransactionStore, B: EventBus> IngestionService<S, B> {
    pub fn new(store: Arc<S>, bus: Arc<B>, topic: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            topic: topic.into(),
        }
    }

    /// Creates a payment transaction and publishes the created event.
    ///
    /// The raw card number never leaves this function: it is validated,
    /// reduced to its fingerprint, and dropped. A reused idempotency key
    /// returns [`AppError::IdempotencyKeyUsed`] without publishing, so a
    /// retried create produces exactly one row and one event.
    #[tracing::instrument(skip(self, raw_card_number), fields(%idempotency_key, amount))]
    pub async fn create_transaction(
        &self,
        amount: f64,
        currency: String,
        raw_card_number: &str,
        idempotency_key: Uuid,
    ) -> Result<Transaction, AppError> {
        // Written as a negated comparison so NaN is rejected too.
        if !(amount > 0.0) {
            return Err(DomainError::InvalidAmount.into());
        }
        let card = CardNumber::parse(raw_card_number)?;

        let tx = Transaction::create(amount, currency, card, idempotency_key);
        self.store.save(&tx).await?;

        // The row is already durable at this point. A failed publish
        // leaves it without an event, and a retry with the same key gets
        // the conflict error - the dual-write gap an outbox would close.
        let event = TransactionCreatedEvent::from(&tx);
        self.bus.publish(event.to_message(&self.topic)?).await?;

        tracing::info!(transaction_id = %tx.id, "transaction accepted");
        Ok(tx)
    }
}
