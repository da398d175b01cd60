//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Fraud rule thresholds.
pub struct FraudConfig {
    pub amount_threshold: f64,
    pub frequency_threshold: u64,
    pub frequency_window: Duration,
}

/// Application configuration, shared by the gateway and the analyzer.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_dlq_topic: String,
    pub kafka_group_id: String,
    pub redis_url: String,
    pub rate_limit_max_requests: u64,
    pub rate_limit_window: Duration,
    pub fraud: FraudConfig,
    /// Bound on one confirmed-publish acknowledgment wait
    pub publish_ack_timeout: Duration,
    /// Bound on the shutdown drain of in-flight publishes
    pub drain_timeout: Duration,
    /// How long an empty consumer poll waits
    pub poll_wait: Duration,
    /// Upper bound on one fetched batch
    pub batch_size: usize,
}

impl Config {
    /// Loads configuration from environment variables, with defaults
    /// matching the local docker-compose setup.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: parsed("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            kafka_brokers: string("KAFKA_BROKERS", "localhost:9092"),
            kafka_topic: string("KAFKA_TOPIC", "transactions.created"),
            kafka_dlq_topic: string("KAFKA_DLQ_TOPIC", "transactions.created.dlq"),
            kafka_group_id: string("KAFKA_GROUP_ID", "anti-fraud-group"),
            redis_url: string("REDIS_URL", "redis://localhost:6379"),
            rate_limit_max_requests: parsed("RATE_LIMIT_MAX_REQUESTS", 100)?,
            rate_limit_window: secs("RATE_LIMIT_WINDOW_SECS", 60)?,
            fraud: FraudConfig {
                amount_threshold: parsed("FRAUD_AMOUNT_THRESHOLD", 1000.0)?,
                frequency_threshold: parsed("FRAUD_FREQUENCY_THRESHOLD", 3)?,
                frequency_window: secs("FRAUD_FREQUENCY_WINDOW_SECS", 60)?,
            },
            publish_ack_timeout: secs("PUBLISH_ACK_TIMEOUT_SECS", 10)?,
            drain_timeout: secs("DRAIN_TIMEOUT_SECS", 30)?,
            poll_wait: secs("CONSUMER_POLL_WAIT_SECS", 1)?,
            batch_size: parsed("CONSUMER_BATCH_SIZE", 64)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn secs(key: &str, default: u64) -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(parsed(key, default)?))
}
