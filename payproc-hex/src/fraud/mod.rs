//! Fraud scoring: the rule engine and the consumer-side worker.

mod engine;
mod worker;

pub use engine::{RuleConfig, StatefulRuleEngine};
pub use worker::{FraudWorker, WorkerConfig};
