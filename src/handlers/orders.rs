use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    handlers::{auth::AuthUser, validate_input},
    services::CreateOrderInput,
    ApiResponse, AppState, ListResponse,
};

pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:order_number", get(get_order))
}

pub fn coupons_routes() -> Router<Arc<AppState>> {
    Router::new().route("/validate", post(validate_coupon))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub coupon_code: Option<String>,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub customer_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    /// Subtotal to evaluate the coupon against, usually the caller's cart
    /// subtotal.
    pub subtotal: Decimal,
}

/// The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses((status = 200, description = "Paginated order list")),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let (orders, total) = state
        .services
        .orders
        .list_orders(user_id, page, per_page)
        .await?;

    Ok(Json(ListResponse {
        data: orders,
        total,
        page,
        per_page,
    }))
}

/// One order with line snapshots and status history
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_number}",
    params(("order_number" = String, Path, description = "Order number, e.g. ORD-AB12CD34")),
    responses(
        (status = 200, description = "Order detail"),
        (status = 404, description = "Unknown order for this caller", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state
        .services
        .orders
        .get_order(user_id, &order_number)
        .await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// Settle the caller's cart into an order.
///
/// Runs the whole settlement in one transaction; any failure (stock
/// shortfall, rejected coupon) leaves cart, stock, and coupon untouched.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Settled order with line snapshots"),
        (status = 400, description = "Empty cart or rejected coupon", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .checkout
        .create_order(
            user_id,
            CreateOrderInput {
                shipping_address_id: payload.shipping_address_id,
                billing_address_id: payload.billing_address_id,
                coupon_code: payload.coupon_code,
                email: payload.email,
                phone: payload.phone,
                customer_notes: payload.customer_notes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(order))))
}

/// Preview a coupon's discount without redeeming it
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Discount preview"),
        (status = 400, description = "Coupon rejected", body = crate::errors::ErrorResponse)
    ),
    tag = "coupons"
)]
pub async fn validate_coupon(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let result = state
        .services
        .coupons
        .evaluate(&payload.code, payload.subtotal, chrono::Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}
