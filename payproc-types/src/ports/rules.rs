//! Fraud rule engine port trait.

use crate::domain::FraudVerdict;
use crate::dto::TransactionCreatedEvent;

/// Evaluates fraud rules against a transaction event.
///
/// Always produces a verdict: rule engines degrade internally (e.g. a
/// frequency rule whose counter store is down skips itself) rather than
/// failing the pipeline.
#[async_trait::async_trait]
pub trait FraudRuleEngine: Send + Sync + 'static {
    /// Applies the rules in fixed order; the first match wins and
    /// short-circuits the rest.
    async fn evaluate(&self, event: &TransactionCreatedEvent) -> FraudVerdict;
}
