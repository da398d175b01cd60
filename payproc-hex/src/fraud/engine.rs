//! Stateful fraud rules over the counter store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use payproc_types::{CounterStore, FraudRuleEngine, FraudVerdict, TransactionCreatedEvent};

/// Rule thresholds, loaded from configuration.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    /// Amounts strictly above this are flagged
    pub amount_threshold: f64,
    /// Per-card transaction count strictly above this within the window
    /// is flagged
    pub frequency_threshold: u64,
    /// Width of the per-card counting window
    pub frequency_window: Duration,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            amount_threshold: 1000.0,
            frequency_threshold: 3,
            frequency_window: Duration::from_secs(60),
        }
    }
}

/// Rule engine combining a stateless amount check with a stateful
/// per-card frequency check.
///
/// Rules run in fixed order and the first match wins: a transaction
/// that trips the amount rule never reaches the frequency rule, so its
/// card counter is not incremented for that event.
pub struct StatefulRuleEngine<C: CounterStore> {
    counters: Arc<C>,
    cfg: RuleConfig,
}

impl<C: CounterStore> StatefulRuleEngine<C> {
    pub fn new(counters: Arc<C>, cfg: RuleConfig) -> Self {
        Self { counters, cfg }
    }
}

#[async_trait]
impl<C: CounterStore> FraudRuleEngine for StatefulRuleEngine<C> {
    async fn evaluate(&self, event: &TransactionCreatedEvent) -> FraudVerdict {
        if event.amount > self.cfg.amount_threshold {
            return FraudVerdict::flagged("Amount exceeds threshold");
        }

        let key = format!("card_tx_count:{}", event.card_number_hash);
        match self.counters.increment(&key, self.cfg.frequency_window).await {
            Ok(count) if count > self.cfg.frequency_threshold => FraudVerdict::flagged(format!(
                "High frequency: {count} transactions in {} seconds",
                self.cfg.frequency_window.as_secs()
            )),
            Ok(_) => FraudVerdict::clean(),
            Err(err) => {
                // Fail open per rule: a down counter store skips the
                // frequency check instead of stalling the pipeline.
                tracing::warn!(
                    transaction_id = %event.transaction_id,
                    error = %err,
                    "counter store unreachable, skipping frequency rule"
                );
                FraudVerdict::clean()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use payproc_types::{CounterError, TransactionId, TransactionStatus};
    use uuid::Uuid;

    fn event(amount: f64, card_hash: &str) -> TransactionCreatedEvent {
        TransactionCreatedEvent {
            transaction_id: TransactionId::new(),
            amount,
            currency: "USD".to_string(),
            card_number_hash: card_hash.to_string(),
            status: TransactionStatus::Processing,
            idempotency_key: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn engine(cfg: RuleConfig) -> StatefulRuleEngine<payproc_store::MemoryCounters> {
        StatefulRuleEngine::new(Arc::new(payproc_store::MemoryCounters::new()), cfg)
    }

    struct DownCounters;

    #[async_trait]
    impl CounterStore for DownCounters {
        async fn increment(&self, _key: &str, _window: Duration) -> Result<u64, CounterError> {
            Err(CounterError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_amount_over_threshold_is_flagged() {
        let engine = engine(RuleConfig::default());

        let verdict = engine.evaluate(&event(1500.0, "card-a")).await;

        assert!(verdict.is_fraudulent);
        assert_eq!(verdict.reason, "Amount exceeds threshold");
    }

    #[tokio::test]
    async fn test_amount_at_threshold_is_clean() {
        let engine = engine(RuleConfig::default());

        let verdict = engine.evaluate(&event(1000.0, "card-a")).await;

        assert!(!verdict.is_fraudulent);
    }

    #[tokio::test]
    async fn test_fourth_transaction_in_window_is_flagged() {
        let engine = engine(RuleConfig::default());

        for _ in 0..3 {
            let verdict = engine.evaluate(&event(10.0, "card-b")).await;
            assert!(!verdict.is_fraudulent);
        }

        let verdict = engine.evaluate(&event(10.0, "card-b")).await;
        assert!(verdict.is_fraudulent);
        assert_eq!(verdict.reason, "High frequency: 4 transactions in 60 seconds");
    }

    #[tokio::test]
    async fn test_frequency_is_tracked_per_card() {
        let engine = engine(RuleConfig {
            frequency_threshold: 1,
            ..RuleConfig::default()
        });

        assert!(!engine.evaluate(&event(10.0, "card-c")).await.is_fraudulent);
        // A different card starts its own counter.
        assert!(!engine.evaluate(&event(10.0, "card-d")).await.is_fraudulent);
        assert!(engine.evaluate(&event(10.0, "card-c")).await.is_fraudulent);
    }

    #[tokio::test]
    async fn test_amount_rule_short_circuits_frequency() {
        let engine = engine(RuleConfig {
            frequency_threshold: 1,
            ..RuleConfig::default()
        });

        // Both rules would match; only the amount reason is recorded,
        // and the card counter is left untouched.
        engine.evaluate(&event(10.0, "card-e")).await;
        let verdict = engine.evaluate(&event(5000.0, "card-e")).await;
        assert_eq!(verdict.reason, "Amount exceeds threshold");

        // The over-threshold event did not consume a counter slot.
        let verdict = engine.evaluate(&event(10.0, "card-e")).await;
        assert!(verdict.is_fraudulent);
        assert!(verdict.reason.starts_with("High frequency"));
    }

    #[tokio::test]
    async fn test_counter_outage_skips_frequency_rule() {
        let engine = StatefulRuleEngine::new(Arc::new(DownCounters), RuleConfig::default());

        let verdict = engine.evaluate(&event(10.0, "card-f")).await;

        assert!(!verdict.is_fraudulent);
        assert!(verdict.reason.is_empty());
    }
}
