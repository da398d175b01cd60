//! Rate limiting middleware over the admission guard.
//!
//! Per-client fixed-window throttling keyed by the caller's IP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use payproc_types::CounterStore;

use crate::guard::RateGuard;

/// Rate limiting middleware.
///
/// Backed by the shared counter store, so every gateway replica sees
/// the same per-client counts.
pub async fn rate_limit_middleware<C: CounterStore>(
    State(guard): State<Arc<RateGuard<C>>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Health checks are not throttled.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let identity = client_identity(&request);
    if !guard.admit(&identity).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "retry_after_seconds": guard.window().as_secs()
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Picks the client identity: the first X-Forwarded-For hop when a
/// proxy set one, otherwise the peer address.
fn client_identity(request: &Request<Body>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
