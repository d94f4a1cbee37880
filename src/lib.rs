//! Storefront backend: catalog, carts, coupons, checkout settlement, and
//! payment reconciliation.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod payment;
pub mod services;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    config::AppConfig, events::EventSender, handlers::AppServices, payment::PaymentProvider,
};

/// Shared application state handed to every handler.
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let services = AppServices::new(
            db.clone(),
            config.clone(),
            event_sender.clone(),
            provider,
        );
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Success envelope returned by non-list endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Paginated list envelope.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Builds the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/products", handlers::products::products_routes())
        .nest("/cart", handlers::carts::carts_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/coupons", handlers::orders::coupons_routes())
        .nest("/payments", handlers::payments::payments_routes())
        .route("/openapi.json", get(openapi_spec));

    Router::new()
        .nest("/api/v1", api)
        .merge(handlers::health::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}
