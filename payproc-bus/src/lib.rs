//! # Payproc Bus
//!
//! Event bus adapters for the payment processing pipeline. This crate
//! provides the transports that implement the `EventBus`, `GroupConsumer`
//! and `TopicReader` ports: Kafka behind the `kafka` feature, and an
//! in-process broker otherwise (development and tests).

use std::time::Duration;

use async_trait::async_trait;
use payproc_types::{BusError, EventBus, GroupConsumer, InboundMessage, OutboundMessage, TopicReader};

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(all(test, not(feature = "kafka")))]
mod memory_tests;

// Re-export individual adapters for direct use if needed
#[cfg(feature = "kafka")]
pub use kafka::{KafkaBus, KafkaGroupConsumer, KafkaReader};
pub use memory::{MemoryBroker, MemoryBus, MemoryGroupConsumer, MemoryReader};

/// Unified publisher wrapper over whichever transport is compiled in.
pub struct Bus {
    #[cfg(not(feature = "kafka"))]
    inner: memory::MemoryBus,
    #[cfg(feature = "kafka")]
    inner: kafka::KafkaBus,
}

/// Build a publisher from a broker address.
///
/// `ack_timeout` bounds how long a confirmed publish waits for its
/// delivery acknowledgment. Without the `kafka` feature the address is
/// only a namespace: handles built from the same address inside one
/// process share an in-memory broker.
///
/// # Examples
///
/// ```ignore
/// let bus = build_bus("localhost:9092", Duration::from_secs(10)).await?;
/// bus.publish(event.to_message("transactions.created")?).await?;
/// ```
pub async fn build_bus(brokers: &str, ack_timeout: Duration) -> anyhow::Result<Bus> {
    Bus::new(brokers, ack_timeout).await
}

impl Bus {
    #[cfg(not(feature = "kafka"))]
    pub async fn new(brokers: &str, _ack_timeout: Duration) -> anyhow::Result<Self> {
        let inner = memory::MemoryBus::new(memory::MemoryBroker::attach(brokers));
        Ok(Self { inner })
    }

    #[cfg(feature = "kafka")]
    pub async fn new(brokers: &str, ack_timeout: Duration) -> anyhow::Result<Self> {
        let inner = kafka::KafkaBus::new(brokers, ack_timeout)?;
        Ok(Self { inner })
    }
}

/// Unified consumer-group wrapper.
pub struct BusConsumer {
    #[cfg(not(feature = "kafka"))]
    inner: memory::MemoryGroupConsumer,
    #[cfg(feature = "kafka")]
    inner: kafka::KafkaGroupConsumer,
}

/// Build a consumer-group member subscribed to one topic.
pub async fn build_consumer(
    brokers: &str,
    group_id: &str,
    topic: &str,
) -> anyhow::Result<BusConsumer> {
    BusConsumer::new(brokers, group_id, topic).await
}

impl BusConsumer {
    #[cfg(not(feature = "kafka"))]
    pub async fn new(brokers: &str, group_id: &str, topic: &str) -> anyhow::Result<Self> {
        let broker = memory::MemoryBroker::attach(brokers);
        let inner = memory::MemoryGroupConsumer::new(broker, group_id, topic);
        Ok(Self { inner })
    }

    #[cfg(feature = "kafka")]
    pub async fn new(brokers: &str, group_id: &str, topic: &str) -> anyhow::Result<Self> {
        let inner = kafka::KafkaGroupConsumer::new(brokers, group_id, topic)?;
        Ok(Self { inner })
    }
}

/// Unified positional reader wrapper.
pub struct BusReader {
    #[cfg(not(feature = "kafka"))]
    inner: memory::MemoryReader,
    #[cfg(feature = "kafka")]
    inner: kafka::KafkaReader,
}

/// Build a topic reader outside any consumer group.
pub async fn build_reader(brokers: &str) -> anyhow::Result<BusReader> {
    BusReader::new(brokers).await
}

impl BusReader {
    #[cfg(not(feature = "kafka"))]
    pub async fn new(brokers: &str) -> anyhow::Result<Self> {
        let inner = memory::MemoryReader::new(memory::MemoryBroker::attach(brokers));
        Ok(Self { inner })
    }

    #[cfg(feature = "kafka")]
    pub async fn new(brokers: &str) -> anyhow::Result<Self> {
        let inner = kafka::KafkaReader::new(brokers)?;
        Ok(Self { inner })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Implement the bus ports for the wrappers (delegation)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl EventBus for Bus {
    async fn publish(&self, msg: OutboundMessage) -> Result<(), BusError> {
        self.inner.publish(msg).map(|_| ())
    }

    async fn publish_confirmed(&self, msg: OutboundMessage) -> Result<(i32, i64), BusError> {
        self.inner.publish(msg)
    }

    async fn drain(&self, _timeout: Duration) -> Result<(), BusError> {
        self.inner.drain();
        Ok(())
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl EventBus for Bus {
    async fn publish(&self, msg: OutboundMessage) -> Result<(), BusError> {
        self.inner.publish(msg)
    }

    async fn publish_confirmed(&self, msg: OutboundMessage) -> Result<(i32, i64), BusError> {
        self.inner.publish_confirmed(msg).await
    }

    async fn drain(&self, timeout: Duration) -> Result<(), BusError> {
        self.inner.drain(timeout).await
    }
}

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl GroupConsumer for BusConsumer {
    async fn poll(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<InboundMessage>, BusError> {
        self.inner.poll(max_messages, max_wait).await
    }

    async fn commit(&self) -> Result<(), BusError> {
        self.inner.commit().await
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl GroupConsumer for BusConsumer {
    async fn poll(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<InboundMessage>, BusError> {
        self.inner.poll(max_messages, max_wait).await
    }

    async fn commit(&self) -> Result<(), BusError> {
        self.inner.commit()
    }
}

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl TopicReader for BusReader {
    async fn read_from_start(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, BusError> {
        Ok(self.inner.read_from_start(topic, limit))
    }

    async fn read_at(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Result<Option<InboundMessage>, BusError> {
        Ok(self.inner.read_at(topic, partition, offset))
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl TopicReader for BusReader {
    async fn read_from_start(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, BusError> {
        self.inner.read_from_start(topic, limit).await
    }

    async fn read_at(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Result<Option<InboundMessage>, BusError> {
        self.inner.read_at(topic, partition, offset).await
    }
}
