//! Data Transfer Objects (DTOs) for the HTTP API and event topics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OutboundMessage, Transaction, TransactionId, TransactionStatus};
use crate::error::BusError;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a payment transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    /// Caller-supplied UUID; format is validated at the transport layer
    pub idempotency_key: String,
    /// Raw card number; validated, fingerprinted and discarded at ingestion
    pub card_number: String,
    /// Amount in the given currency, must be positive
    pub amount: f64,
    /// ISO-like currency code
    pub currency: String,
}

/// Response after a transaction is accepted for processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAcceptedResponse {
    /// Unique transaction identifier
    pub transaction_id: TransactionId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Event DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// The "transaction created" event body published to the primary topic.
///
/// Field names are the wire contract; consumers in other systems decode
/// against them, so they change only with a topic version bump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCreatedEvent {
    pub transaction_id: TransactionId,
    pub amount: f64,
    pub currency: String,
    pub card_number_hash: String,
    pub status: TransactionStatus,
    pub idempotency_key: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionCreatedEvent {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            amount: tx.amount,
            currency: tx.currency.clone(),
            card_number_hash: tx.card_fingerprint.clone(),
            status: tx.status,
            idempotency_key: tx.idempotency_key,
            created_at: tx.created_at,
        }
    }
}

impl TransactionCreatedEvent {
    /// Encodes the event as a JSON message keyed by transaction id, so
    /// all events for one transaction route to the same partition.
    pub fn to_message(&self, topic: &str) -> Result<OutboundMessage, BusError> {
        let payload = serde_json::to_vec(self)?;
        let key = self.transaction_id.to_string().into_bytes();
        Ok(OutboundMessage::new(topic, Some(key), payload))
    }

    /// Decodes an event from a raw message payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
