//! Event-bus port traits.
//!
//! Three narrow contracts instead of one wide one: the gateway only
//! publishes, the fraud worker only consumes within a group, and the
//! replay tool only reads at explicit coordinates.

use std::time::Duration;

use crate::domain::{InboundMessage, OutboundMessage};
use crate::error::BusError;

/// Publisher half of the bus.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Hands a message to the transport. An `Ok` means the message was
    /// accepted for delivery; the acknowledgment arrives asynchronously
    /// and is tracked internally, so callers are not blocked on
    /// replication.
    async fn publish(&self, msg: OutboundMessage) -> Result<(), BusError>;

    /// Publishes and waits for the delivery acknowledgment, returning
    /// the `(partition, offset)` the message was appended at. Used where
    /// losing the message is not acceptable (dead-letter sends, replay).
    async fn publish_confirmed(&self, msg: OutboundMessage) -> Result<(i32, i64), BusError>;

    /// Stops accepting new publishes, then waits up to `timeout` for all
    /// in-flight acknowledgments. Publishing after drain returns
    /// [`BusError::Draining`].
    async fn drain(&self, timeout: Duration) -> Result<(), BusError>;
}

/// Consumer-group member with manually committed offsets.
#[async_trait::async_trait]
pub trait GroupConsumer: Send + Sync + 'static {
    /// Fetches the next batch from assigned partitions, waiting up to
    /// `max_wait`. An empty batch means the wait elapsed with nothing
    /// to deliver; it is not an error.
    async fn poll(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<InboundMessage>, BusError>;

    /// Commits the offsets of every message delivered by previous
    /// `poll` calls. Messages delivered but not yet committed are
    /// redelivered after a crash - at-least-once semantics.
    async fn commit(&self) -> Result<(), BusError>;
}

/// Positional reader outside any consumer group, for inspection tools.
#[async_trait::async_trait]
pub trait TopicReader: Send + Sync + 'static {
    /// Reads up to `limit` messages from the beginning of a topic
    /// across all partitions. Non-destructive; commits nothing.
    async fn read_from_start(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, BusError>;

    /// Reads exactly the message at the given coordinates, or `None`
    /// when the offset does not exist (yet).
    async fn read_at(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Result<Option<InboundMessage>, BusError>;
}
