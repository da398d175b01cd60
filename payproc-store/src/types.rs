//! Shared database row types with feature-gated fields for SQLite and
//! PostgreSQL.
//!
//! SQLite stores UUIDs and timestamps as TEXT; PostgreSQL uses native
//! types. The `into_domain` conversions absorb the difference so the
//! adapters stay symmetrical.

use sqlx::FromRow;

use payproc_types::{CardActivity, FraudReport, StoreError, TransactionId};

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

#[cfg(feature = "sqlite")]
fn parse_uuid(s: &str) -> Result<uuid::Uuid, StoreError> {
    uuid::Uuid::parse_str(s).map_err(|e| StoreError::Unavailable(e.to_string()))
}

#[cfg(feature = "sqlite")]
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, StoreError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::Unavailable(e.to_string()))
}

/// Fraud verdict row from the database.
#[derive(FromRow)]
pub struct DbFraudReport {
    #[cfg(not(feature = "sqlite"))]
    pub transaction_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub transaction_id: String,

    pub is_fraudulent: bool,
    pub reason: String,
    pub card_fingerprint: String,
    pub amount: f64,

    #[cfg(not(feature = "sqlite"))]
    pub evaluated_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub evaluated_at: String,
}

impl DbFraudReport {
    pub fn into_domain(self) -> Result<FraudReport, StoreError> {
        #[cfg(not(feature = "sqlite"))]
        let (transaction_id, evaluated_at) = (self.transaction_id, self.evaluated_at);

        #[cfg(feature = "sqlite")]
        let (transaction_id, evaluated_at) = (
            parse_uuid(&self.transaction_id)?,
            parse_timestamp(&self.evaluated_at)?,
        );

        Ok(FraudReport {
            transaction_id: TransactionId::from_uuid(transaction_id),
            is_fraudulent: self.is_fraudulent,
            reason: self.reason,
            card_fingerprint: self.card_fingerprint,
            amount: self.amount,
            evaluated_at,
        })
    }
}

/// Per-card aggregate row for the busiest-cards query.
#[derive(FromRow)]
pub struct DbCardActivity {
    pub card_fingerprint: String,
    pub transaction_count: i64,
}

impl DbCardActivity {
    pub fn into_domain(self) -> CardActivity {
        CardActivity {
            card_fingerprint: self.card_fingerprint,
            transaction_count: self.transaction_count.max(0) as u64,
        }
    }
}
