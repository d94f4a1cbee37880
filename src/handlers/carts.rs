use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    handlers::{auth::AuthUser, validate_input},
    services::AddLineInput,
    ApiResponse, AppState,
};

pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", patch(update_item))
        .route("/items/:item_id", delete(remove_item))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// The caller's cart with derived totals, created on first access.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart with derived totals"),
        (status = 401, description = "Missing identity", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.carts.get_cart(user_id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// Add a product (or variant) to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Unknown product or variant", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
                quantity: payload.quantity,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// Set a cart line's quantity
#[utoipa::path(
    patch,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "No such line in the caller's cart", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .carts
        .update_line(user_id, item_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// Remove one line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "No such line in the caller's cart", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.carts.remove_line(user_id, item_id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// Empty the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 200, description = "Emptied cart")),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.carts.clear(user_id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}
