//! Consumer-side fraud scoring worker.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info, warn};

use payproc_types::{
    BusError, DeadLetterEnvelope, EventBus, FraudReport, FraudRuleEngine, GroupConsumer,
    InboundMessage, TransactionCreatedEvent, UNMARSHAL_ERROR, VerdictStore,
};

/// Worker knobs, loaded from configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Where undecodable messages are routed
    pub dead_letter_topic: String,
    /// Upper bound on one fetched batch
    pub batch_size: usize,
    /// How long an empty poll waits before returning
    pub poll_wait: Duration,
    /// Verdict persistence attempts before the row is given up on
    pub persist_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            dead_letter_topic: "transactions.created.dlq".to_string(),
            batch_size: 64,
            poll_wait: Duration::from_secs(1),
            persist_attempts: 3,
        }
    }
}

/// One consumer-group member running poll -> decode -> evaluate ->
/// persist -> commit.
///
/// Offsets are committed only after the whole fetched batch is handled,
/// which gives at-least-once processing: a crash between persist and
/// commit redelivers the batch (counters may over-count on the rerun, a
/// documented trade-off). Two failures stop the worker instead of being
/// skipped: a dead-letter send that fails, because poison messages must
/// never be dropped, and a commit that fails, because polling past an
/// uncommitted batch would grow the reprocessing scope without bound.
pub struct FraudWorker<G, E, V, B>
where
    G: GroupConsumer,
    E: FraudRuleEngine,
    V: VerdictStore,
    B: EventBus,
{
    consumer: G,
    engine: E,
    verdicts: Arc<V>,
    dead_letters: Arc<B>,
    cfg: WorkerConfig,
}

impl<G, E, V, B> FraudWorker<G, E, V, B>
where
    G: GroupConsumer,
    E: FraudRuleEngine,
    V: VerdictStore,
    B: EventBus,
{
    pub fn new(consumer: G, engine: E, verdicts: Arc<V>, dead_letters: Arc<B>, cfg: WorkerConfig) -> Self {
        Self {
            consumer,
            engine,
            verdicts,
            dead_letters,
            cfg,
        }
    }

    /// Runs the worker loop until `shutdown` flips to `true` (or its
    /// sender is dropped) or a fatal bus error occurs. An in-flight
    /// batch is always finished and committed before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), BusError> {
        info!(dead_letter_topic = %self.cfg.dead_letter_topic, "fraud worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let batch = tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown request.
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                polled = self.consumer.poll(self.cfg.batch_size, self.cfg.poll_wait) => polled?,
            };
            if batch.is_empty() {
                continue;
            }
            for msg in batch {
                self.handle(msg).await?;
            }
            self.consumer.commit().await?;
        }
        info!("fraud worker stopped");
        Ok(())
    }

    async fn handle(&self, msg: InboundMessage) -> Result<(), BusError> {
        let event = match TransactionCreatedEvent::decode(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %err,
                    "undecodable message, routing to dead-letter topic"
                );
                let envelope = DeadLetterEnvelope::wrap(&msg, UNMARSHAL_ERROR, err.to_string());
                self.dead_letters
                    .publish_confirmed(envelope.to_message(&self.cfg.dead_letter_topic))
                    .await?;
                return Ok(());
            }
        };

        let verdict = self.engine.evaluate(&event).await;
        if verdict.is_fraudulent {
            warn!(
                transaction_id = %event.transaction_id,
                reason = %verdict.reason,
                "fraudulent transaction detected"
            );
        }

        let report = FraudReport::new(
            event.transaction_id,
            verdict,
            event.card_number_hash,
            event.amount,
        );
        self.persist_with_retry(&report).await;
        Ok(())
    }

    /// Appends the verdict row, retrying with jittered backoff. After
    /// the final attempt the failure is logged and the message still
    /// counts as handled, so the batch commits.
    async fn persist_with_retry(&self, report: &FraudReport) {
        let mut delay = Duration::from_millis(50);
        for attempt in 1..=self.cfg.persist_attempts {
            match self.verdicts.record(report).await {
                Ok(()) => return,
                Err(err) if attempt == self.cfg.persist_attempts => {
                    error!(
                        transaction_id = %report.transaction_id,
                        attempts = attempt,
                        error = %err,
                        "giving up on verdict persistence, row is lost"
                    );
                }
                Err(err) => {
                    warn!(
                        transaction_id = %report.transaction_id,
                        attempt,
                        error = %err,
                        "verdict persistence failed, retrying"
                    );
                    let jitter = rand::rng().random_range(0..=delay.as_millis() as u64 / 2);
                    tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use payproc_store::{MemoryCounters, MemoryDatabase};
    use payproc_types::{
        CardNumber, ERROR_TYPE_HEADER, OutboundMessage, StoreError, TopicReader, Transaction,
    };
    use uuid::Uuid;

    use crate::fraud::{RuleConfig, StatefulRuleEngine};

    const TOPIC: &str = "transactions.created";
    const DLQ_TOPIC: &str = "transactions.created.dlq";

    fn event_for(amount: f64, card_hash: &str) -> TransactionCreatedEvent {
        let card = CardNumber::parse("4242424242424242").unwrap();
        let mut tx = Transaction::create(amount, "USD".to_string(), card, Uuid::new_v4());
        tx.card_fingerprint = card_hash.to_string();
        TransactionCreatedEvent::from(&tx)
    }

    async fn publish_event(bus: &payproc_bus::Bus, event: &TransactionCreatedEvent) {
        bus.publish_confirmed(event.to_message(TOPIC).unwrap())
            .await
            .unwrap();
    }

    /// Runs a worker over everything currently in the topic, then shuts
    /// it down.
    async fn run_worker<V: VerdictStore>(namespace: &str, verdicts: Arc<V>) {
        let consumer = payproc_bus::build_consumer(namespace, "anti-fraud-group", TOPIC)
            .await
            .unwrap();
        let dlq_bus = Arc::new(
            payproc_bus::build_bus(namespace, Duration::from_secs(1))
                .await
                .unwrap(),
        );
        let engine = StatefulRuleEngine::new(Arc::new(MemoryCounters::new()), RuleConfig::default());
        let worker = FraudWorker::new(
            consumer,
            engine,
            verdicts,
            dlq_bus,
            WorkerConfig {
                poll_wait: Duration::from_millis(50),
                ..WorkerConfig::default()
            },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));
        // Give the worker time to drain the topic before stopping it.
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_clean_and_fraudulent_events_both_get_verdicts() {
        let ns = "worker-verdicts";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        let db = Arc::new(MemoryDatabase::new());

        publish_event(&bus, &event_for(50.0, "card-clean")).await;
        publish_event(&bus, &event_for(1500.0, "card-big")).await;

        run_worker(ns, db.clone()).await;

        let fraudulent = db.recent_fraudulent(10).await.unwrap();
        assert_eq!(fraudulent.len(), 1);
        assert_eq!(fraudulent[0].reason, "Amount exceeds threshold");
        assert_eq!(fraudulent[0].card_fingerprint, "card-big");

        let activity = db.top_card_fingerprints(10).await.unwrap();
        assert_eq!(activity.len(), 2);
    }

    #[tokio::test]
    async fn test_poison_message_is_dead_lettered_not_dropped() {
        let ns = "worker-poison";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        let db = Arc::new(MemoryDatabase::new());

        bus.publish_confirmed(OutboundMessage::new(
            TOPIC,
            Some(b"poison".to_vec()),
            b"{ not json".to_vec(),
        ))
        .await
        .unwrap();
        publish_event(&bus, &event_for(50.0, "card-ok")).await;

        run_worker(ns, db.clone()).await;

        // The valid event was still scored.
        let activity = db.top_card_fingerprints(10).await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].card_fingerprint, "card-ok");

        // The poison message landed in the DLQ with its metadata.
        let reader = payproc_bus::build_reader(ns).await.unwrap();
        let dead = reader.read_from_start(DLQ_TOPIC, 10).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload, b"{ not json");
        assert_eq!(dead[0].key.as_deref(), Some(&b"poison"[..]));
        assert_eq!(dead[0].header_str(ERROR_TYPE_HEADER), Some(UNMARSHAL_ERROR));
    }

    #[tokio::test]
    async fn test_committed_batch_is_not_redelivered() {
        let ns = "worker-commit";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        let db = Arc::new(MemoryDatabase::new());

        publish_event(&bus, &event_for(50.0, "card-once")).await;
        run_worker(ns, db.clone()).await;
        // A second worker in the same group starts from the committed
        // offsets and sees nothing.
        run_worker(ns, db.clone()).await;

        let activity = db.top_card_fingerprints(10).await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].transaction_count, 1);
    }

    /// Verdict store that fails a configurable number of times before
    /// accepting writes.
    struct FlakyVerdicts {
        inner: MemoryDatabase,
        failures_left: std::sync::atomic::AtomicU32,
    }

    #[async_trait::async_trait]
    impl VerdictStore for FlakyVerdicts {
        async fn record(&self, report: &FraudReport) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("timeout".to_string()));
            }
            self.inner.record(report).await
        }

        async fn recent_fraudulent(
            &self,
            limit: u32,
        ) -> Result<Vec<FraudReport>, StoreError> {
            self.inner.recent_fraudulent(limit).await
        }

        async fn top_card_fingerprints(
            &self,
            limit: u32,
        ) -> Result<Vec<payproc_types::CardActivity>, StoreError> {
            self.inner.top_card_fingerprints(limit).await
        }
    }

    #[tokio::test]
    async fn test_verdict_persistence_is_retried() {
        let ns = "worker-retry";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        let verdicts = Arc::new(FlakyVerdicts {
            inner: MemoryDatabase::new(),
            failures_left: std::sync::atomic::AtomicU32::new(2),
        });

        publish_event(&bus, &event_for(1500.0, "card-flaky")).await;
        run_worker(ns, verdicts.clone()).await;

        let fraudulent = verdicts.recent_fraudulent(10).await.unwrap();
        assert_eq!(fraudulent.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_still_commits_the_batch() {
        let ns = "worker-lost-verdict";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        // More failures than attempts: the verdict row is lost.
        let verdicts = Arc::new(FlakyVerdicts {
            inner: MemoryDatabase::new(),
            failures_left: std::sync::atomic::AtomicU32::new(10),
        });

        publish_event(&bus, &event_for(1500.0, "card-lost")).await;
        run_worker(ns, verdicts.clone()).await;

        assert!(verdicts.recent_fraudulent(10).await.unwrap().is_empty());

        // The offset was still committed: a fresh worker with a working
        // store does not see the message again.
        let healthy = Arc::new(MemoryDatabase::new());
        run_worker(ns, healthy.clone()).await;
        assert!(healthy.top_card_fingerprints(10).await.unwrap().is_empty());
    }

    /// Bus whose publishes always fail, standing in for an unreachable
    /// dead-letter broker.
    struct DownBus;

    #[async_trait::async_trait]
    impl EventBus for DownBus {
        async fn publish(&self, _msg: OutboundMessage) -> Result<(), BusError> {
            Err(BusError::Unavailable("dlq broker down".to_string()))
        }

        async fn publish_confirmed(&self, _msg: OutboundMessage) -> Result<(i32, i64), BusError> {
            Err(BusError::Unavailable("dlq broker down".to_string()))
        }

        async fn drain(&self, _timeout: Duration) -> Result<(), BusError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dead_letter_send_failure_stops_the_worker() {
        let ns = "worker-dlq-down";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        bus.publish_confirmed(OutboundMessage::new(
            TOPIC,
            Some(b"poison".to_vec()),
            b"{ not json".to_vec(),
        ))
        .await
        .unwrap();

        let consumer = payproc_bus::build_consumer(ns, "anti-fraud-group", TOPIC)
            .await
            .unwrap();
        let engine =
            StatefulRuleEngine::new(Arc::new(MemoryCounters::new()), RuleConfig::default());
        let worker = FraudWorker::new(
            consumer,
            engine,
            Arc::new(MemoryDatabase::new()),
            Arc::new(DownBus),
            WorkerConfig {
                poll_wait: Duration::from_millis(50),
                ..WorkerConfig::default()
            },
        );

        // Keep the sender alive so the only exit path is the error.
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = worker.run(shutdown_rx).await.unwrap_err();
        assert!(matches!(err, BusError::Unavailable(_)));
    }

    /// Consumer whose offset commits always fail.
    struct StuckOffsets<C: GroupConsumer> {
        inner: C,
    }

    #[async_trait::async_trait]
    impl<C: GroupConsumer> GroupConsumer for StuckOffsets<C> {
        async fn poll(
            &self,
            max_messages: usize,
            max_wait: Duration,
        ) -> Result<Vec<InboundMessage>, BusError> {
            self.inner.poll(max_messages, max_wait).await
        }

        async fn commit(&self) -> Result<(), BusError> {
            Err(BusError::Unavailable("offset store down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_commit_failure_stops_the_worker() {
        let ns = "worker-commit-down";
        let bus = payproc_bus::build_bus(ns, Duration::from_secs(1)).await.unwrap();
        let db = Arc::new(MemoryDatabase::new());

        publish_event(&bus, &event_for(1500.0, "card-stuck")).await;

        let consumer = StuckOffsets {
            inner: payproc_bus::build_consumer(ns, "anti-fraud-group", TOPIC)
                .await
                .unwrap(),
        };
        let engine =
            StatefulRuleEngine::new(Arc::new(MemoryCounters::new()), RuleConfig::default());
        let dlq_bus = Arc::new(
            payproc_bus::build_bus(ns, Duration::from_secs(1))
                .await
                .unwrap(),
        );
        let worker = FraudWorker::new(
            consumer,
            engine,
            db.clone(),
            dlq_bus,
            WorkerConfig {
                poll_wait: Duration::from_millis(50),
                ..WorkerConfig::default()
            },
        );

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = worker.run(shutdown_rx).await.unwrap_err();
        assert!(matches!(err, BusError::Unavailable(_)));

        // The batch was fully handled before the commit attempt.
        let fraudulent = db.recent_fraudulent(10).await.unwrap();
        assert_eq!(fraudulent.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_the_worker() {
        let ns = "worker-dropped-sender";
        let consumer = payproc_bus::build_consumer(ns, "anti-fraud-group", TOPIC)
            .await
            .unwrap();
        let engine =
            StatefulRuleEngine::new(Arc::new(MemoryCounters::new()), RuleConfig::default());
        let dlq_bus = Arc::new(
            payproc_bus::build_bus(ns, Duration::from_secs(1))
                .await
                .unwrap(),
        );
        let worker = FraudWorker::new(
            consumer,
            engine,
            Arc::new(MemoryDatabase::new()),
            dlq_bus,
            WorkerConfig {
                poll_wait: Duration::from_millis(50),
                ..WorkerConfig::default()
            },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        // The worker exits cleanly instead of spinning without a sender.
        tokio::time::timeout(Duration::from_secs(2), worker.run(shutdown_rx))
            .await
            .expect("worker did not stop after sender was dropped")
            .unwrap();
    }

    #[test]
    fn test_worker_config_defaults() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.dead_letter_topic, DLQ_TOPIC);
        assert_eq!(cfg.persist_attempts, 3);
    }
}
