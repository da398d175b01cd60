//! Transaction domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::CardNumber;

/// Unique identifier for a Transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random TransactionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TransactionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a transaction.
///
/// Every transaction starts as `Processing`; settlement stages owned by
/// other systems move it to `Completed` or `Failed` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Accepted for processing, outcome not yet known
    Processing,
    /// Settled successfully
    Completed,
    /// Rejected or failed downstream
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Processing => write!(f, "PROCESSING"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// The canonical record of a payment attempt.
///
/// Holds only the card fingerprint, never the raw card number -
/// the raw number is discarded inside [`Transaction::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier, generated at ingestion
    pub id: TransactionId,
    /// Lifecycle status
    pub status: TransactionStatus,
    /// Positive amount in the given currency
    pub amount: f64,
    /// ISO-like currency code, e.g. "USD"
    pub currency: String,
    /// One-way hash of the card number
    pub card_fingerprint: String,
    /// Caller-supplied key for duplicate detection, unique per transaction
    pub idempotency_key: Uuid,
    /// When the transaction was created
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction in `Processing` state.
    ///
    /// The raw card number is consumed here: only its fingerprint is
    /// kept on the resulting record.
    pub fn create(amount: f64, currency: String, card: CardNumber, idempotency_key: Uuid) -> Self {
        Self {
            id: TransactionId::new(),
            status: TransactionStatus::Processing,
            amount,
            currency,
            card_fingerprint: card.fingerprint(),
            idempotency_key,
            created_at: Utc::now(),
        }
    }

}
