//! Dead-letter envelopes for messages a consumer could not process.

use super::message::{InboundMessage, OutboundMessage};

/// Header carrying the failure class, e.g. [`UNMARSHAL_ERROR`].
pub const ERROR_TYPE_HEADER: &str = "error_type";
/// Header carrying the human-readable failure description.
pub const ERROR_STRING_HEADER: &str = "error_string";
/// Header carrying the topic the message originally arrived on.
pub const ORIGINAL_TOPIC_HEADER: &str = "original_topic";

/// Failure class for payloads that could not be decoded.
pub const UNMARSHAL_ERROR: &str = "unmarshal_error";

/// Placeholder shown when a dead-letter record is missing a header.
const MISSING_HEADER: &str = "N/A";

/// An unprocessable message, preserved with enough context to inspect
/// and replay it.
///
/// The original payload and key are kept byte-for-byte so a replay is
/// indistinguishable from the original publish. `partition` and `offset`
/// are the coordinates of the message this envelope was built from:
/// the source-topic position when wrapping a fresh failure, the
/// dead-letter position when reading the channel back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterEnvelope {
    pub payload: Vec<u8>,
    pub key: Option<Vec<u8>>,
    pub original_topic: String,
    pub partition: i32,
    pub offset: i64,
    pub error_type: String,
    pub error_string: String,
}

impl DeadLetterEnvelope {
    /// Wraps a message the consumer failed to process.
    pub fn wrap(
        failed: &InboundMessage,
        error_type: impl Into<String>,
        error_string: impl Into<String>,
    ) -> Self {
        Self {
            payload: failed.payload.clone(),
            key: failed.key.clone(),
            original_topic: failed.topic.clone(),
            partition: failed.partition,
            offset: failed.offset,
            error_type: error_type.into(),
            error_string: error_string.into(),
        }
    }

    /// Reconstructs an envelope from a record read off the dead-letter
    /// channel. Missing headers fall back to `"N/A"` rather than failing;
    /// the channel must stay inspectable even for oddly-produced records.
    pub fn from_message(msg: &InboundMessage) -> Self {
        let header_or_na =
            |name: &str| msg.header_str(name).unwrap_or(MISSING_HEADER).to_string();
        Self {
            payload: msg.payload.clone(),
            key: msg.key.clone(),
            original_topic: header_or_na(ORIGINAL_TOPIC_HEADER),
            partition: msg.partition,
            offset: msg.offset,
            error_type: header_or_na(ERROR_TYPE_HEADER),
            error_string: header_or_na(ERROR_STRING_HEADER),
        }
    }

    /// Builds the dead-letter record for publication: original payload
    /// and key, failure context in headers.
    pub fn to_message(&self, dead_letter_topic: &str) -> OutboundMessage {
        OutboundMessage::new(dead_letter_topic, self.key.clone(), self.payload.clone())
            .with_header(ERROR_TYPE_HEADER, self.error_type.as_str())
            .with_header(ERROR_STRING_HEADER, self.error_string.as_str())
            .with_header(ORIGINAL_TOPIC_HEADER, self.original_topic.as_str())
    }

    /// Builds the replay record: original payload and key, no failure
    /// headers, destined for the target topic.
    pub fn replay_message(&self, target_topic: &str) -> OutboundMessage {
        OutboundMessage::new(target_topic, self.key.clone(), self.payload.clone())
    }

    /// Key rendered for operator output.
    pub fn key_display(&self) -> String {
        match &self.key {
            Some(key) => String::from_utf8_lossy(key).into_owned(),
            None => MISSING_HEADER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poison_message() -> InboundMessage {
        InboundMessage {
            topic: "transactions.created".to_string(),
            partition: 2,
            offset: 41,
            key: Some(b"tx-1".to_vec()),
            payload: b"not json".to_vec(),
            headers: Vec::new(),
        }
    }

    #[test]
    fn test_wrap_preserves_payload_key_and_coordinates() {
        let envelope = DeadLetterEnvelope::wrap(&poison_message(), UNMARSHAL_ERROR, "bad json");

        assert_eq!(envelope.payload, b"not json");
        assert_eq!(envelope.key.as_deref(), Some(&b"tx-1"[..]));
        assert_eq!(envelope.original_topic, "transactions.created");
        assert_eq!(envelope.partition, 2);
        assert_eq!(envelope.offset, 41);
        assert_eq!(envelope.error_type, UNMARSHAL_ERROR);
    }

    #[test]
    fn test_round_trip_through_dead_letter_message() {
        let envelope = DeadLetterEnvelope::wrap(&poison_message(), UNMARSHAL_ERROR, "bad json");
        let record = envelope.to_message("transactions.created.dlq");

        assert_eq!(record.topic, "transactions.created.dlq");
        assert_eq!(record.payload, b"not json");
        assert_eq!(record.key.as_deref(), Some(&b"tx-1"[..]));

        // Pretend the record landed at DLQ partition 0, offset 5.
        let read_back = InboundMessage {
            topic: record.topic,
            partition: 0,
            offset: 5,
            key: record.key,
            payload: record.payload,
            headers: record.headers,
        };
        let restored = DeadLetterEnvelope::from_message(&read_back);

        assert_eq!(restored.payload, b"not json");
        assert_eq!(restored.original_topic, "transactions.created");
        assert_eq!(restored.error_type, UNMARSHAL_ERROR);
        assert_eq!(restored.error_string, "bad json");
        assert_eq!(restored.offset, 5);
    }

    #[test]
    fn test_missing_headers_fall_back_to_na() {
        let bare = InboundMessage {
            topic: "transactions.created.dlq".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: b"{}".to_vec(),
            headers: Vec::new(),
        };
        let envelope = DeadLetterEnvelope::from_message(&bare);

        assert_eq!(envelope.error_type, "N/A");
        assert_eq!(envelope.error_string, "N/A");
        assert_eq!(envelope.original_topic, "N/A");
        assert_eq!(envelope.key_display(), "N/A");
    }

    #[test]
    fn test_replay_message_carries_no_failure_headers() {
        let envelope = DeadLetterEnvelope::wrap(&poison_message(), UNMARSHAL_ERROR, "bad json");
        let replayed = envelope.replay_message("transactions.created");

        assert_eq!(replayed.topic, "transactions.created");
        assert_eq!(replayed.payload, b"not json");
        assert_eq!(replayed.key.as_deref(), Some(&b"tx-1"[..]));
        assert!(replayed.headers.is_empty());
    }
}
