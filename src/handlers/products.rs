use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{errors::ServiceError, ApiResponse, AppState, ListResponse};

pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductListQuery {
    /// 1-based page number
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Include inactive products (hidden by default)
    pub include_inactive: Option<bool>,
}

/// Browse the catalog
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Paginated product list"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let active_only = !query.include_inactive.unwrap_or(false);

    let (products, total) = state
        .services
        .catalog
        .list_products(page, per_page, active_only)
        .await?;

    Ok(Json(ListResponse {
        data: products,
        total,
        page,
        per_page,
    }))
}

/// One product with its variants
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with variants"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}
