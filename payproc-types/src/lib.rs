//! # Payproc Types
//!
//! Domain types and port traits for the payment processing pipeline.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Transaction, CardNumber, FraudVerdict)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for the API and event boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    CardActivity, CardNumber, DeadLetterEnvelope, ERROR_STRING_HEADER, ERROR_TYPE_HEADER,
    FraudReport, FraudVerdict, InboundMessage, ORIGINAL_TOPIC_HEADER, OutboundMessage, Transaction,
    TransactionId, TransactionStatus, UNMARSHAL_ERROR,
};
pub use dto::*;
pub use error::{AppError, BusError, CounterError, DomainError, StoreError};
pub use ports::{
    CounterStore, EventBus, FraudRuleEngine, GroupConsumer, TopicReader, TransactionStore,
    VerdictStore,
};
