//! Raw messages crossing the event-bus boundary.
//!
//! These are transport-shaped value objects: byte payloads plus routing
//! metadata. Typed events are encoded into / decoded out of them at the
//! edges (see `dto`).

/// A message fetched from a topic, with the coordinates it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was fetched from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Position within the partition
    pub offset: i64,
    /// Routing key, if the producer set one
    pub key: Option<Vec<u8>>,
    /// Raw message body
    pub payload: Vec<u8>,
    /// Transport headers as name/value pairs
    pub headers: Vec<(String, Vec<u8>)>,
}

impl InboundMessage {
    /// Looks up the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Returns a header value decoded as UTF-8, if present and valid.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// True when the message was read at exactly these coordinates.
    /// Positional readers use this to detect a transport that silently
    /// repositioned the fetch (e.g. after log truncation).
    pub fn at_coordinates(&self, partition: i32, offset: i64) -> bool {
        self.partition == partition && self.offset == offset
    }
}

/// A message to be appended to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination topic
    pub topic: String,
    /// Routing key; messages with the same key land on the same partition
    pub key: Option<Vec<u8>>,
    /// Raw message body
    pub payload: Vec<u8>,
    /// Transport headers as name/value pairs
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutboundMessage {
    /// Creates a message with no headers.
    pub fn new(topic: impl Into<String>, key: Option<Vec<u8>>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key,
            payload,
            headers: Vec::new(),
        }
    }

    /// Appends a header, builder-style.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
