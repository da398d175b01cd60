//! Dead-letter operator tool.
//!
//! Inspects the dead-letter topic and replays individual messages back
//! into the pipeline. Exits non-zero on any I/O failure.

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use payproc_hex::DeadLetterService;

#[derive(Parser)]
#[command(name = "dlq-tool")]
#[command(author, version, about = "Inspect and replay dead-lettered messages", long_about = None)]
struct Cli {
    /// Broker addresses
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    brokers: String,

    /// Dead-letter topic to operate on
    #[arg(long, env = "KAFKA_DLQ_TOPIC", default_value = "transactions.created.dlq")]
    dlq_topic: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// View messages in the dead-letter topic
    View {
        /// Number of messages to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Republish one dead-lettered message by its coordinates
    Retry {
        /// Message coordinates as partition:offset, e.g. 0:42
        coordinates: Coordinates,

        /// Topic the message is republished to
        #[arg(long, env = "KAFKA_TOPIC", default_value = "transactions.created")]
        target_topic: String,
    },
}

/// partition:offset pair addressing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Coordinates {
    partition: i32,
    offset: i64,
}

impl FromStr for Coordinates {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (partition, offset) = s
            .split_once(':')
            .ok_or_else(|| format!("expected partition:offset, got '{s}'"))?;
        Ok(Self {
            partition: partition
                .parse()
                .map_err(|_| format!("invalid partition '{partition}'"))?,
            offset: offset
                .parse()
                .map_err(|_| format!("invalid offset '{offset}'"))?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let reader = payproc_bus::build_reader(&cli.brokers)
        .await
        .context("failed to connect a topic reader")?;
    let bus = payproc_bus::build_bus(&cli.brokers, std::time::Duration::from_secs(10))
        .await
        .context("failed to connect a producer")?;
    let service = DeadLetterService::new(reader, bus, cli.dlq_topic.clone());

    match cli.command {
        Command::View { limit } => {
            let envelopes = service
                .view(limit)
                .await
                .with_context(|| format!("failed to read {}", cli.dlq_topic))?;

            if envelopes.is_empty() {
                println!("no messages in {}", cli.dlq_topic);
                return Ok(());
            }

            println!(
                "{:<10} {:<8} {:<38} {:<18} ERROR_STRING",
                "PARTITION", "OFFSET", "KEY", "ERROR_TYPE"
            );
            for envelope in envelopes {
                println!(
                    "{:<10} {:<8} {:<38} {:<18} {}",
                    envelope.partition,
                    envelope.offset,
                    envelope.key_display(),
                    envelope.error_type,
                    envelope.error_string
                );
            }
        }
        Command::Retry {
            coordinates,
            target_topic,
        } => {
            let (partition, offset) = service
                .replay(coordinates.partition, coordinates.offset, &target_topic)
                .await
                .with_context(|| {
                    format!(
                        "failed to replay {}:{} to {target_topic}",
                        coordinates.partition, coordinates.offset
                    )
                })?;
            println!(
                "replayed {}:{} from {} to {target_topic} (landed at {partition}:{offset})",
                coordinates.partition, coordinates.offset, cli.dlq_topic
            );
        }
    }

    Ok(())
}
