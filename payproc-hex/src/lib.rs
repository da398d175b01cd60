//! # Payproc Hex
//!
//! Application core of the payment processing pipeline. The services in
//! this crate implement the business behavior against the port traits in
//! `payproc-types`; the concrete storage and transport adapters are
//! injected by the binaries in `payproc-app`.
//!
//! ## Architecture
//!
//! - `service` - transaction ingestion (validate, fingerprint, persist, publish)
//! - `guard` - per-client rate admission in front of ingestion
//! - `fraud` - rule engine and the consumer-side scoring worker
//! - `replay` - dead-letter inspection and operator replay
//! - `inbound` - HTTP adapter (Axum server)

pub mod fraud;
pub mod guard;
pub mod inbound;
pub mod replay;
pub mod service;


pub use fraud::{FraudWorker, RuleConfig, StatefulRuleEngine, WorkerConfig};
pub use guard::RateGuard;
pub use replay::DeadLetterService;
pub use service::IngestionService;
