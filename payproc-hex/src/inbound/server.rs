//! HTTP Server configuration and startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use payproc_types::{CounterStore, EventBus, TransactionStore};

use super::handlers::{self, AppState};
use super::rate_limit::rate_limit_middleware;
use crate::guard::RateGuard;
use crate::service::IngestionService;

/// HTTP server for the transaction ingestion API.
pub struct HttpServer<S: TransactionStore, B: EventBus, C: CounterStore> {
    state: Arc<AppState<S, B>>,
    guard: Arc<RateGuard<C>>,
}

impl<S: TransactionStore, B: EventBus, C: CounterStore> HttpServer<S, B, C> {
    /// Creates a new HTTP server with the given service and guard.
    pub fn new(service: IngestionService<S, B>, guard: RateGuard<C>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            guard: Arc::new(guard),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/transaction", post(handlers::create_transaction::<S, B>))
            .layer(middleware::from_fn_with_state(
                self.guard.clone(),
                rate_limit_middleware::<C>,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
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

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
