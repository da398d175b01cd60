//! In-process event bus.
//!
//! A partitioned append-only log with consumer groups and committed
//! offsets, mirroring the external broker closely enough that the
//! pipeline runs unchanged against either. Used for development and
//! tests; a process restart loses everything, so production runs the
//! `kafka` feature.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::Instant;

use payproc_types::{BusError, InboundMessage, OutboundMessage};

/// Partitions per topic. Fixed for the in-memory transport; the
/// external broker owns real partition planning.
const PARTITIONS: i32 = 3;

/// Process-local broker namespaces, keyed by the configured broker
/// address so producers and consumers built from the same config share
/// a broker.
static BROKERS: LazyLock<DashMap<String, Arc<MemoryBroker>>> = LazyLock::new(DashMap::new);

#[derive(Clone)]
struct StoredMessage {
    key: Option<Vec<u8>>,
    payload: Vec<u8>,
    headers: Vec<(String, Vec<u8>)>,
}

struct TopicLog {
    partitions: Vec<RwLock<Vec<StoredMessage>>>,
}

impl TopicLog {
    fn new() -> Self {
        Self {
            partitions: (0..PARTITIONS).map(|_| RwLock::new(Vec::new())).collect(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct GroupOffsetKey {
    group: String,
    topic: String,
    partition: i32,
}

/// Shared state behind every in-memory bus handle in one namespace.
pub struct MemoryBroker {
    topics: DashMap<String, Arc<TopicLog>>,
    committed: DashMap<GroupOffsetKey, i64>,
    // Bumped on every append; consumers watch it instead of polling
    // in a tight loop.
    appends: watch::Sender<u64>,
}

impl MemoryBroker {
    /// Returns the broker for a namespace, creating it on first use.
    pub fn attach(namespace: &str) -> Arc<Self> {
        BROKERS
            .entry(namespace.to_string())
            .or_insert_with(|| {
                let (appends, _) = watch::channel(0);
                Arc::new(Self {
                    topics: DashMap::new(),
                    committed: DashMap::new(),
                    appends,
                })
            })
            .clone()
    }

    fn topic(&self, name: &str) -> Arc<TopicLog> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TopicLog::new()))
            .clone()
    }

    /// Appends a message, returning the coordinates it landed at.
    fn append(&self, msg: OutboundMessage, round_robin: &AtomicUsize) -> (i32, i64) {
        let topic = self.topic(&msg.topic);
        let partition = match &msg.key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % PARTITIONS as u64) as i32
            }
            None => (round_robin.fetch_add(1, Ordering::Relaxed) % PARTITIONS as usize) as i32,
        };
        let offset = {
            let mut log = topic.partitions[partition as usize]
                .write()
                .expect("partition lock poisoned");
            log.push(StoredMessage {
                key: msg.key,
                payload: msg.payload,
                headers: msg.headers,
            });
            (log.len() - 1) as i64
        };
        self.appends.send_modify(|v| *v += 1);
        (partition, offset)
    }

    fn read(&self, topic: &str, partition: i32, offset: i64) -> Option<InboundMessage> {
        let log = self.topics.get(topic)?.clone();
        let part = log.partitions.get(partition as usize)?;
        let guard = part.read().expect("partition lock poisoned");
        let stored = guard.get(usize::try_from(offset).ok()?)?;
        Some(to_inbound(topic, partition, offset, stored))
    }
}

fn to_inbound(topic: &str, partition: i32, offset: i64, stored: &StoredMessage) -> InboundMessage {
    InboundMessage {
        topic: topic.to_string(),
        partition,
        offset,
        key: stored.key.clone(),
        payload: stored.payload.clone(),
        headers: stored.headers.clone(),
    }
}

/// Publisher handle onto an in-memory broker.
///
/// Appends are synchronous, so the acknowledgment the external broker
/// delivers asynchronously is here implied by `publish` returning `Ok`;
/// `drain` only has to fence off new publishes. Clones share the closed
/// flag, so draining one handle drains them all.
#[derive(Clone)]
pub struct MemoryBus {
    broker: Arc<MemoryBroker>,
    closed: Arc<AtomicBool>,
    round_robin: Arc<AtomicUsize>,
}

impl MemoryBus {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self {
            broker,
            closed: Arc::new(AtomicBool::new(false)),
            round_robin: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn publish(&self, msg: OutboundMessage) -> Result<(i32, i64), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Draining);
        }
        Ok(self.broker.append(msg, &self.round_robin))
    }

    pub(crate) fn drain(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Consumer-group member over the in-memory broker.
///
/// The in-memory transport hands every partition to each member, so run
/// one member per group; balanced assignment across members is the
/// external broker's job. Offsets are committed per group and survive
/// the member being dropped, which is what gives redelivery-after-crash
/// its test coverage.
pub struct MemoryGroupConsumer {
    broker: Arc<MemoryBroker>,
    group: String,
    topic: String,
    // Next offset to deliver, per partition. Seeded from the group's
    // committed offsets at construction.
    positions: tokio::sync::Mutex<HashMap<i32, i64>>,
    updates: tokio::sync::Mutex<watch::Receiver<u64>>,
}

impl MemoryGroupConsumer {
    pub fn new(broker: Arc<MemoryBroker>, group: &str, topic: &str) -> Self {
        broker.topic(topic);
        let mut positions = HashMap::new();
        for partition in 0..PARTITIONS {
            let key = GroupOffsetKey {
                group: group.to_string(),
                topic: topic.to_string(),
                partition,
            };
            let committed = broker.committed.get(&key).map(|v| *v).unwrap_or(0);
            positions.insert(partition, committed);
        }
        let updates = broker.appends.subscribe();
        Self {
            broker,
            group: group.to_string(),
            topic: topic.to_string(),
            positions: tokio::sync::Mutex::new(positions),
            updates: tokio::sync::Mutex::new(updates),
        }
    }

    /// Grabs everything deliverable right now, up to `max`.
    async fn take_available(&self, max: usize) -> Vec<InboundMessage> {
        let mut positions = self.positions.lock().await;
        let topic = self.broker.topic(&self.topic);
        let mut batch = Vec::new();
        for partition in 0..PARTITIONS {
            let log = topic.partitions[partition as usize]
                .read()
                .expect("partition lock poisoned");
            let next = positions.entry(partition).or_insert(0);
            while (*next as usize) < log.len() && batch.len() < max {
                batch.push(to_inbound(
                    &self.topic,
                    partition,
                    *next,
                    &log[*next as usize],
                ));
                *next += 1;
            }
            if batch.len() >= max {
                break;
            }
        }
        batch
    }

    pub(crate) async fn poll(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<InboundMessage>, BusError> {
        let deadline = Instant::now() + max_wait;
        let mut updates = self.updates.lock().await;
        loop {
            // Mark the current append version seen before scanning, so
            // an append racing the scan still triggers `changed`.
            updates.borrow_and_update();
            let batch = self.take_available(max_messages).await;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            match tokio::time::timeout(remaining, updates.changed()).await {
                Ok(Ok(())) => continue,
                // Broker dropped or wait elapsed: nothing to deliver.
                Ok(Err(_)) | Err(_) => return Ok(Vec::new()),
            }
        }
    }

    pub(crate) async fn commit(&self) -> Result<(), BusError> {
        let positions = self.positions.lock().await;
        for (partition, next) in positions.iter() {
            let key = GroupOffsetKey {
                group: self.group.clone(),
                topic: self.topic.clone(),
                partition: *partition,
            };
            self.broker.committed.insert(key, *next);
        }
        Ok(())
    }
}

/// Positional reader over the in-memory broker.
pub struct MemoryReader {
    broker: Arc<MemoryBroker>,
}

impl MemoryReader {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }

    pub(crate) fn read_from_start(&self, topic: &str, limit: usize) -> Vec<InboundMessage> {
        let Some(log) = self.broker.topics.get(topic).map(|t| t.clone()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (partition, part) in log.partitions.iter().enumerate() {
            let guard = part.read().expect("partition lock poisoned");
            for (offset, stored) in guard.iter().enumerate() {
                if out.len() >= limit {
                    return out;
                }
                out.push(to_inbound(topic, partition as i32, offset as i64, stored));
            }
        }
        out
    }

    pub(crate) fn read_at(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Option<InboundMessage> {
        self.broker.read(topic, partition, offset)
    }
}
