//! HTTP surface.
//!
//! One module per resource, each exposing a `*_routes()` router merged into
//! the versioned API in [`crate::router`]. Handlers stay thin: decode,
//! validate, call a service, wrap the result in [`crate::ApiResponse`].

pub mod auth;
pub mod carts;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use validator::Validate;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    payment::PaymentProvider,
    services::{
        CartService, CatalogService, CheckoutService, CouponService, NotificationService,
        OrderService, PaymentService,
    },
};

/// Service container shared by every handler through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let notifier = Arc::new(NotificationService::new(&config));
        let coupons = Arc::new(CouponService::new(db.clone()));

        Self {
            catalog: Arc::new(CatalogService::new(db.clone())),
            carts: Arc::new(CartService::new(
                db.clone(),
                event_sender.clone(),
                notifier.clone(),
            )),
            coupons: coupons.clone(),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                config.clone(),
                coupons,
                event_sender.clone(),
            )),
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                notifier.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                db,
                config,
                provider,
                event_sender,
                notifier,
            )),
        }
    }
}

/// Runs `validator` checks on a request body, surfacing failures as 400s.
pub(crate) fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|err| ServiceError::ValidationError(err.to_string()))
}
