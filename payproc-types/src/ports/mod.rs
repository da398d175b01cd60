//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod bus;
mod counter;
mod rules;
mod store;

pub use bus::{EventBus, GroupConsumer, TopicReader};
pub use counter::CounterStore;
pub use rules::FraudRuleEngine;
pub use store::{TransactionStore, VerdictStore};
