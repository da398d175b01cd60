//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use payproc_types::{
    AppError, CreateTransactionRequest, EventBus, TransactionAcceptedResponse, TransactionStore,
};

use crate::IngestionService;

/// Application state shared across handlers.
pub struct AppState<S: TransactionStore, B: EventBus> {
    pub service: IngestionService<S, B>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::IdempotencyKeyUsed => (StatusCode::CONFLICT, self.0.to_string()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Create a payment transaction.
///
/// The card number is deliberately kept out of the span fields.
#[tracing::instrument(skip(state, req), fields(amount = req.amount, currency = %req.currency))]
pub async fn create_transaction<S: TransactionStore, B: EventBus>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let idempotency_key: Uuid = req
        .idempotency_key
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid idempotency key: expected a UUID".into()))?;

    let tx = state
        .service
        .create_transaction(req.amount, req.currency, &req.card_number, idempotency_key)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TransactionAcceptedResponse {
            transaction_id: tx.id,
        }),
    ))
}
