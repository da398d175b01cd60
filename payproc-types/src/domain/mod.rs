//! Domain models for the payment processing pipeline.

pub mod card;
pub mod dead_letter;
pub mod message;
pub mod transaction;
pub mod verdict;

pub use card::CardNumber;
pub use dead_letter::{
    DeadLetterEnvelope, ERROR_STRING_HEADER, ERROR_TYPE_HEADER, ORIGINAL_TOPIC_HEADER,
    UNMARSHAL_ERROR,
};
pub use message::{InboundMessage, OutboundMessage};
pub use transaction::{Transaction, TransactionId, TransactionStatus};
pub use verdict::{CardActivity, FraudReport, FraudVerdict};
