//! Fraud-scoring consumer.
//!
//! Runs one fraud worker in the configured consumer group until
//! SIGINT/SIGTERM, letting the in-flight batch finish before exiting.

use std::sync::Arc;

use tokio::sync::watch;

use payproc_app::{config::Config, init_tracing};
use payproc_hex::{FraudWorker, RuleConfig, StatefulRuleEngine, WorkerConfig};
use payproc_types::EventBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("payproc_analyzer=info,payproc_hex=info");

    let cfg = Config::from_env()?;

    let database = Arc::new(payproc_store::build_database(&cfg.database_url).await?);
    let counters = Arc::new(payproc_store::build_counters(&cfg.redis_url)?);
    let consumer =
        payproc_bus::build_consumer(&cfg.kafka_brokers, &cfg.kafka_group_id, &cfg.kafka_topic)
            .await?;
    let dlq_bus = Arc::new(payproc_bus::build_bus(&cfg.kafka_brokers, cfg.publish_ack_timeout).await?);

    let engine = StatefulRuleEngine::new(
        counters,
        RuleConfig {
            amount_threshold: cfg.fraud.amount_threshold,
            frequency_threshold: cfg.fraud.frequency_threshold,
            frequency_window: cfg.fraud.frequency_window,
        },
    );
    let worker = FraudWorker::new(
        consumer,
        engine,
        database,
        dlq_bus.clone(),
        WorkerConfig {
            dead_letter_topic: cfg.kafka_dlq_topic.clone(),
            batch_size: cfg.batch_size,
            poll_wait: cfg.poll_wait,
            persist_attempts: 3,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping after the current batch...");
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(
        group = %cfg.kafka_group_id,
        topic = %cfg.kafka_topic,
        dlq_topic = %cfg.kafka_dlq_topic,
        "starting fraud analyzer"
    );
    worker.run(shutdown_rx).await?;

    if let Err(err) = dlq_bus.drain(cfg.drain_timeout).await {
        tracing::warn!(error = %err, "dead-letter bus drain incomplete");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
