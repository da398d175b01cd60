//! Kafka event bus adapters, enabled with the `kafka` feature.
//!
//! Producer acks are awaited off the caller's path and tracked so
//! shutdown can drain them; consumption uses manually committed
//! offsets for at-least-once delivery.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rdkafka::Offset;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::topic_partition_list::TopicPartitionList;
use tokio::sync::watch;
use tracing::{debug, error, info};

use payproc_types::{BusError, InboundMessage, OutboundMessage};

/// How long metadata and positional reads may wait on the broker.
const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Once a batch has its first message, only already-buffered messages
/// are taken; this is the grab window.
const BATCH_LINGER: Duration = Duration::from_millis(10);

/// Publisher backed by a Kafka producer.
pub struct KafkaBus {
    producer: FutureProducer,
    closed: AtomicBool,
    // Count of publishes whose delivery ack has not arrived yet.
    in_flight: Arc<watch::Sender<usize>>,
    ack_timeout: Duration,
}

impl KafkaBus {
    pub fn new(brokers: &str, ack_timeout: Duration) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        let (in_flight, _) = watch::channel(0usize);
        Ok(Self {
            producer,
            closed: AtomicBool::new(false),
            in_flight: Arc::new(in_flight),
            ack_timeout,
        })
    }

    fn enqueue(&self, msg: &OutboundMessage) -> Result<rdkafka::producer::DeliveryFuture, BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Draining);
        }
        let mut record: FutureRecord<'_, Vec<u8>, Vec<u8>> =
            FutureRecord::to(&msg.topic).payload(&msg.payload);
        if let Some(key) = &msg.key {
            record = record.key(key);
        }
        if !msg.headers.is_empty() {
            let mut headers = OwnedHeaders::new();
            for (name, value) in &msg.headers {
                headers = headers.insert(Header {
                    key: name,
                    value: Some(value),
                });
            }
            record = record.headers(headers);
        }
        match self.producer.send_result(record) {
            Ok(delivery) => Ok(delivery),
            Err((e, _)) => Err(BusError::Unavailable(e.to_string())),
        }
    }

    pub(crate) fn publish(&self, msg: OutboundMessage) -> Result<(), BusError> {
        let topic = msg.topic.clone();
        let delivery = self.enqueue(&msg)?;
        self.in_flight.send_modify(|n| *n += 1);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => {
                    debug!(topic, partition, offset, "message delivered");
                }
                Ok(Err((e, _))) => error!(topic, error = %e, "message delivery failed"),
                Err(_) => error!(topic, "delivery ack channel dropped before resolving"),
            }
            in_flight.send_modify(|n| *n -= 1);
        });
        Ok(())
    }

    pub(crate) async fn publish_confirmed(
        &self,
        msg: OutboundMessage,
    ) -> Result<(i32, i64), BusError> {
        let delivery = self.enqueue(&msg)?;
        match tokio::time::timeout(self.ack_timeout, delivery).await {
            Ok(Ok(Ok((partition, offset)))) => Ok((partition, offset)),
            Ok(Ok(Err((e, _)))) => Err(BusError::Unavailable(e.to_string())),
            Ok(Err(_)) => Err(BusError::Unavailable(
                "delivery ack channel dropped before resolving".to_string(),
            )),
            Err(_) => Err(BusError::Unavailable(
                "timed out waiting for delivery ack".to_string(),
            )),
        }
    }

    pub(crate) async fn drain(&self, timeout: Duration) -> Result<(), BusError> {
        self.closed.store(true, Ordering::Release);
        let mut outstanding = self.in_flight.subscribe();
        match tokio::time::timeout(timeout, outstanding.wait_for(|n| *n == 0)).await {
            Ok(_) => {
                info!("all in-flight deliveries acknowledged");
                Ok(())
            }
            Err(_) => Err(BusError::Unavailable(format!(
                "drain timed out with {} deliveries outstanding",
                *self.in_flight.borrow()
            ))),
        }
    }
}

/// Consumer-group member backed by a Kafka consumer.
pub struct KafkaGroupConsumer {
    consumer: StreamConsumer,
}

impl KafkaGroupConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        Ok(Self { consumer })
    }

    pub(crate) async fn poll(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<InboundMessage>, BusError> {
        let mut batch = Vec::new();
        let mut wait = max_wait;
        while batch.len() < max_messages {
            match tokio::time::timeout(wait, self.consumer.recv()).await {
                Err(_) => break,
                Ok(Ok(m)) => {
                    batch.push(to_inbound(&m));
                    wait = BATCH_LINGER;
                }
                Ok(Err(e)) if batch.is_empty() => {
                    return Err(BusError::Unavailable(e.to_string()));
                }
                Ok(Err(e)) => {
                    // Keep the partial batch; the next poll surfaces the
                    // error if it persists.
                    debug!(error = %e, "consumer error mid-batch");
                    break;
                }
            }
        }
        Ok(batch)
    }

    pub(crate) fn commit(&self) -> Result<(), BusError> {
        self.consumer
            .commit_consumer_state(CommitMode::Sync)
            .map_err(|e| BusError::CommitFailed(e.to_string()))
    }
}

/// Positional reader backed by an assign-only Kafka consumer.
pub struct KafkaReader {
    consumer: StreamConsumer,
}

impl KafkaReader {
    pub fn new(brokers: &str) -> Result<Self, BusError> {
        // Never subscribes and never commits; the group id is only there
        // because the client requires one.
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", "payproc-reader")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        Ok(Self { consumer })
    }

    pub(crate) async fn read_from_start(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, BusError> {
        let metadata = self
            .consumer
            .fetch_metadata(Some(topic), READ_TIMEOUT)
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        let Some(topic_meta) = metadata.topics().iter().find(|t| t.name() == topic) else {
            return Ok(Vec::new());
        };
        let mut tpl = TopicPartitionList::new();
        let mut pending: HashSet<i32> = HashSet::new();
        for partition in topic_meta.partitions() {
            tpl.add_partition_offset(topic, partition.id(), Offset::Beginning)
                .map_err(|e| BusError::Unavailable(e.to_string()))?;
            pending.insert(partition.id());
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        self.consumer
            .assign(&tpl)
            .map_err(|e| BusError::Unavailable(e.to_string()))?;

        let mut out = Vec::new();
        while out.len() < limit && !pending.is_empty() {
            match tokio::time::timeout(READ_TIMEOUT, self.consumer.recv()).await {
                Err(_) => break,
                Ok(Ok(m)) => out.push(to_inbound(&m)),
                Ok(Err(KafkaError::PartitionEOF(partition))) => {
                    pending.remove(&partition);
                }
                Ok(Err(e)) => return Err(BusError::Unavailable(e.to_string())),
            }
        }
        Ok(out)
    }

    pub(crate) async fn read_at(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Result<Option<InboundMessage>, BusError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(offset))
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        self.consumer
            .assign(&tpl)
            .map_err(|e| BusError::Unavailable(e.to_string()))?;

        match tokio::time::timeout(READ_TIMEOUT, self.consumer.recv()).await {
            Err(_) => Err(BusError::Unavailable(
                "timed out reading from broker".to_string(),
            )),
            Ok(Err(KafkaError::PartitionEOF(_))) => Ok(None),
            Ok(Err(e)) => Err(BusError::Unavailable(e.to_string())),
            Ok(Ok(m)) => {
                // When retention has truncated the log below the
                // requested offset, auto.offset.reset repositions the
                // fetch to log start and delivers a different record.
                let msg = to_inbound(&m);
                if msg.at_coordinates(partition, offset) {
                    Ok(Some(msg))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

fn to_inbound(m: &BorrowedMessage<'_>) -> InboundMessage {
    let headers = m
        .headers()
        .map(|hs| {
            hs.iter()
                .map(|h| {
                    (
                        h.key.to_string(),
                        h.value.map(|v| v.to_vec()).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    InboundMessage {
        topic: m.topic().to_string(),
        partition: m.partition(),
        offset: m.offset(),
        key: m.key().map(|k| k.to_vec()),
        payload: m.payload().map(|p| p.to_vec()).unwrap_or_default(),
        headers,
    }
}
