//! Error types for the payment processing pipeline.

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid card number: {0}")]
    InvalidCard(String),
}

/// Storage-level errors (transaction and verdict stores).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Idempotency key already used")]
    DuplicateIdempotencyKey,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Counter-store errors (rate and frequency counters).
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Event-bus errors (publish, consume, commit).
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Bus is draining, publish rejected")]
    Draining,

    #[error("Message encoding failed: {0}")]
    Encode(String),

    #[error("Offset commit failed: {0}")]
    CommitFailed(String),
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Encode(err.to_string())
    }
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes: bad input, conflict, transient
/// unavailability, everything else.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Idempotency key already used")]
    IdempotencyKeyUsed,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdempotencyKey => AppError::IdempotencyKeyUsed,
            StoreError::Unavailable(e) => AppError::Unavailable(e),
        }
    }
}

impl From<BusError> for AppError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Unavailable(e) => AppError::Unavailable(e),
            BusError::Draining => AppError::Unavailable("event bus is shutting down".into()),
            BusError::Encode(e) => AppError::Internal(e),
            BusError::CommitFailed(e) => AppError::Internal(e),
        }
    }
}
