//! HTTP ingestion gateway.
//!
//! Wires storage, counters, and the event bus into the ingestion
//! service and serves the transaction API until shutdown, then drains
//! in-flight publishes.

use std::sync::Arc;

use payproc_app::{config::Config, init_tracing};
use payproc_hex::{IngestionService, RateGuard, inbound::HttpServer};
use payproc_types::EventBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("payproc_gateway=info,payproc_hex=info,tower_http=info");

    let cfg = Config::from_env()?;

    let database = Arc::new(payproc_store::build_database(&cfg.database_url).await?);
    let counters = Arc::new(payproc_store::build_counters(&cfg.redis_url)?);
    let bus = Arc::new(payproc_bus::build_bus(&cfg.kafka_brokers, cfg.publish_ack_timeout).await?);

    let service = IngestionService::new(database, bus.clone(), cfg.kafka_topic.clone());
    let guard = RateGuard::new(counters, cfg.rate_limit_max_requests, cfg.rate_limit_window);

    tracing::info!(topic = %cfg.kafka_topic, "starting ingestion gateway");
    HttpServer::new(service, guard).run(&cfg.bind_addr()).await?;

    // The server has stopped accepting requests; wait for outstanding
    // delivery acks before releasing the producer.
    if let Err(err) = bus.drain(cfg.drain_timeout).await {
        tracing::warn!(error = %err, "event bus drain incomplete");
    }

    Ok(())
}
