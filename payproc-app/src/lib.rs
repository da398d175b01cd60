//! # Payproc App
//!
//! Binary wiring for the payment processing pipeline:
//! - `payproc-gateway` - HTTP ingestion service
//! - `payproc-analyzer` - fraud-scoring consumer
//!
//! Both load [`config::Config`] from the environment and initialize the
//! same tracing stack.

pub mod config;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the tracing subscriber with an env-filtered fmt layer.
///
/// `RUST_LOG` controls the filter; the default keeps the pipeline
/// crates at info.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
