use axum::{
    body::Bytes as RawBody,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    errors::ServiceError,
    handlers::{auth::AuthUser, validate_input},
    ApiResponse, AppState,
};

pub fn payments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/intent", post(create_intent))
        .route("/confirm", post(confirm_payment))
        .route("/webhook", post(webhook))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PaymentOrderRequest {
    #[validate(length(min = 1, max = 32))]
    pub order_number: String,
}

/// Create a payment intent for an unpaid order
#[utoipa::path(
    post,
    path = "/api/v1/payments/intent",
    request_body = PaymentOrderRequest,
    responses(
        (status = 200, description = "Intent created", body = crate::services::PaymentIntentResponse),
        (status = 400, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PaymentOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let intent = state
        .services
        .payments
        .create_intent(user_id, &payload.order_number)
        .await?;
    Ok(Json(ApiResponse::ok(intent)))
}

/// Confirm payment by re-checking the intent with the provider.
///
/// The provider's reported status is authoritative; the client's claim of
/// success is never trusted.
#[utoipa::path(
    post,
    path = "/api/v1/payments/confirm",
    request_body = PaymentOrderRequest,
    responses(
        (status = 200, description = "Order reconciled against provider state"),
        (status = 400, description = "Provider does not report success", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PaymentOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .payments
        .confirm_payment(user_id, &payload.order_number)
        .await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// Provider webhook endpoint.
///
/// Unauthenticated by design; every delivery is verified against the signing
/// secret before the body is even parsed. The raw bytes are required because
/// the signature covers the exact payload as sent.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    responses(
        (status = 200, description = "Delivery processed or deliberately ignored"),
        (status = 401, description = "Signature verification failed", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: RawBody,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.payments.handle_webhook(&headers, &body).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "received": true }))))
}
