//! Fraud evaluation outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transaction::TransactionId;

/// Outcome of running the fraud rules against one transaction.
///
/// `reason` is empty when the transaction is clean; when flagged it holds
/// the first matching rule's reason (rules short-circuit, first match wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudVerdict {
    pub is_fraudulent: bool,
    pub reason: String,
}

impl FraudVerdict {
    /// A verdict for a transaction that tripped no rule.
    pub fn clean() -> Self {
        Self {
            is_fraudulent: false,
            reason: String::new(),
        }
    }

    /// A verdict for a transaction flagged by a rule.
    pub fn flagged(reason: impl Into<String>) -> Self {
        Self {
            is_fraudulent: true,
            reason: reason.into(),
        }
    }
}

/// One append-only row in the analytical verdict store.
///
/// Never mutated after creation; reprocessing the same transaction
/// appends a second row rather than updating the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub transaction_id: TransactionId,
    pub is_fraudulent: bool,
    pub reason: String,
    pub card_fingerprint: String,
    pub amount: f64,
    pub evaluated_at: DateTime<Utc>,
}

impl FraudReport {
    /// Builds a report row from an evaluated transaction.
    pub fn new(
        transaction_id: TransactionId,
        verdict: FraudVerdict,
        card_fingerprint: String,
        amount: f64,
    ) -> Self {
        Self {
            transaction_id,
            is_fraudulent: verdict.is_fraudulent,
            reason: verdict.reason,
            card_fingerprint,
            amount,
            evaluated_at: Utc::now(),
        }
    }
}

/// Per-card aggregate used by the "busiest cards" analytical query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardActivity {
    pub card_fingerprint: String,
    pub transaction_count: u64,
}
