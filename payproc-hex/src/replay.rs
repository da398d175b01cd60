//! Dead-letter channel inspection and replay.

use payproc_types::{BusError, DeadLetterEnvelope, EventBus, TopicReader};

/// Operator-facing view of the dead-letter channel.
///
/// `view` is non-destructive and `replay` leaves the original entry in
/// place; which offsets were already replayed is tracked outside the
/// system. Each replay invocation re-injects the message exactly once.
pub struct DeadLetterService<R: TopicReader, B: EventBus> {
    reader: R,
    bus: B,
    dead_letter_topic: String,
}

impl<R: TopicReader, B: EventBus> DeadLetterService<R, B> {
    pub fn new(reader: R, bus: B, dead_letter_topic: impl Into<String>) -> Self {
        Self {
            reader,
            bus,
            dead_letter_topic: dead_letter_topic.into(),
        }
    }

    /// Reads up to `limit` envelopes from the start of the channel.
    pub async fn view(&self, limit: usize) -> Result<Vec<DeadLetterEnvelope>, BusError> {
        let messages = self
            .reader
            .read_from_start(&self.dead_letter_topic, limit)
            .await?;
        Ok(messages.iter().map(DeadLetterEnvelope::from_message).collect())
    }

    /// Republishes the message at the given coordinates to
    /// `target_topic`, payload and key unchanged, waiting for the
    /// delivery acknowledgment. Returns where the replayed message
    /// landed.
    pub async fn replay(
        &self,
        partition: i32,
        offset: i64,
        target_topic: &str,
    ) -> Result<(i32, i64), BusError> {
        let msg = self
            .reader
            .read_at(&self.dead_letter_topic, partition, offset)
            .await?
            .ok_or_else(|| {
                BusError::Unavailable(format!(
                    "no message at {partition}:{offset} in {}",
                    self.dead_letter_topic
                ))
            })?;
        let envelope = DeadLetterEnvelope::from_message(&msg);

        tracing::info!(
            partition,
            offset,
            target_topic,
            error_type = %envelope.error_type,
            "replaying dead-lettered message"
        );
        self.bus
            .publish_confirmed(envelope.replay_message(target_topic))
            .await
    }
}
