//! In-memory bus integration tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use payproc_types::{BusError, EventBus, GroupConsumer, OutboundMessage, TopicReader};

    use crate::{Bus, BusConsumer, BusReader, build_bus, build_consumer, build_reader};

    const TOPIC: &str = "transactions.created";

    // Each test gets its own namespace; the broker registry is
    // process-wide.
    async fn setup(namespace: &str) -> (Bus, BusConsumer, BusReader) {
        let bus = build_bus(namespace, Duration::from_secs(1)).await.unwrap();
        let consumer = build_consumer(namespace, "anti-fraud-group", TOPIC)
            .await
            .unwrap();
        let reader = build_reader(namespace).await.unwrap();
        (bus, consumer, reader)
    }

    fn message(key: &str, payload: &str) -> OutboundMessage {
        OutboundMessage::new(TOPIC, Some(key.as_bytes().to_vec()), payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_publish_then_poll_round_trip() {
        let (bus, consumer, _) = setup("ns-round-trip").await;

        let msg = message("tx-1", "{\"amount\":10}").with_header("error_type", "none");
        bus.publish(msg).await.unwrap();

        let batch = consumer.poll(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].topic, TOPIC);
        assert_eq!(batch[0].key.as_deref(), Some(&b"tx-1"[..]));
        assert_eq!(batch[0].payload, b"{\"amount\":10}");
        assert_eq!(batch[0].header_str("error_type"), Some("none"));
    }

    #[tokio::test]
    async fn test_same_key_routes_to_same_partition() {
        let (bus, _, _) = setup("ns-key-routing").await;

        let (p1, o1) = bus.publish_confirmed(message("tx-7", "a")).await.unwrap();
        let (p2, o2) = bus.publish_confirmed(message("tx-7", "b")).await.unwrap();

        assert_eq!(p1, p2);
        assert_eq!(o2, o1 + 1);
    }

    #[tokio::test]
    async fn test_commit_prevents_redelivery() {
        let (bus, consumer, _) = setup("ns-commit").await;

        bus.publish(message("a", "1")).await.unwrap();
        bus.publish(message("b", "2")).await.unwrap();

        let batch = consumer.poll(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 2);
        consumer.commit().await.unwrap();
        drop(consumer);

        // A fresh member of the same group starts from the committed
        // offsets and sees nothing.
        let replacement = build_consumer("ns-commit", "anti-fraud-group", TOPIC)
            .await
            .unwrap();
        let batch = replacement.poll(10, Duration::from_millis(50)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_uncommitted_messages_are_redelivered() {
        let (bus, consumer, _) = setup("ns-redelivery").await;

        bus.publish(message("a", "1")).await.unwrap();

        let batch = consumer.poll(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 1);
        // Crash before commit: drop the member without committing.
        drop(consumer);

        let replacement = build_consumer("ns-redelivery", "anti-fraud-group", TOPIC)
            .await
            .unwrap();
        let batch = replacement.poll(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 1, "at-least-once means redelivery after a crash");
        assert_eq!(batch[0].payload, b"1");
    }

    #[tokio::test]
    async fn test_drain_rejects_new_publishes() {
        let (bus, _, _) = setup("ns-drain").await;

        bus.publish(message("a", "1")).await.unwrap();
        bus.drain(Duration::from_secs(1)).await.unwrap();

        let result = bus.publish(message("b", "2")).await;
        assert!(matches!(result, Err(BusError::Draining)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_empty_after_wait() {
        let (_, consumer, _) = setup("ns-empty-poll").await;

        let batch = consumer.poll(10, Duration::from_secs(5)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_publish_wakes_waiting_consumer() {
        let (bus, consumer, _) = setup("ns-wakeup").await;

        let waiter = tokio::spawn(async move {
            consumer.poll(10, Duration::from_secs(2)).await.unwrap()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        bus.publish(message("late", "arrival")).await.unwrap();

        let batch = waiter.await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, b"arrival");
    }

    #[tokio::test]
    async fn test_read_from_start_respects_limit() {
        let (bus, _, reader) = setup("ns-read-limit").await;

        for i in 0..5 {
            bus.publish(message(&format!("k{i}"), "x")).await.unwrap();
        }

        let all = reader.read_from_start(TOPIC, 100).await.unwrap();
        assert_eq!(all.len(), 5);

        let limited = reader.read_from_start(TOPIC, 2).await.unwrap();
        assert_eq!(limited.len(), 2);

        let missing = reader.read_from_start("no.such.topic", 10).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_read_at_exact_coordinates() {
        let (bus, _, reader) = setup("ns-read-at").await;

        let (partition, offset) = bus
            .publish_confirmed(message("tx-9", "payload-9"))
            .await
            .unwrap();

        let found = reader.read_at(TOPIC, partition, offset).await.unwrap();
        let msg = found.expect("message should exist at its own coordinates");
        assert_eq!(msg.payload, b"payload-9");
        assert_eq!(msg.key.as_deref(), Some(&b"tx-9"[..]));

        let absent = reader.read_at(TOPIC, partition, offset + 100).await.unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_groups_consume_independently() {
        let namespace = "ns-two-groups";
        let (bus, consumer, _) = setup(namespace).await;
        let other = build_consumer(namespace, "other-group", TOPIC).await.unwrap();

        bus.publish(message("a", "1")).await.unwrap();

        let batch = consumer.poll(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 1);
        consumer.commit().await.unwrap();

        // The other group's offsets are untouched by that commit.
        let batch = other.poll(10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(batch.len(), 1);
    }
}
