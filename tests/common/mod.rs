//! Shared integration-test harness.
//!
//! Tests run against an in-memory SQLite database (single connection, schema
//! created from the entities) with a stub payment provider injected through
//! the `PaymentProvider` trait.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db,
    entities::{
        coupon, customer_address, product, product_variant, CouponModel, CustomerAddressModel,
        DiscountType, ProductModel, ProductVariantModel,
    },
    errors::ServiceError,
    events,
    handlers::AppServices,
    payment::{CreateIntentRequest, IntentStatus, PaymentProvider, ProviderIntent},
};

/// Stub payment provider with a settable intent status.
pub struct StubProvider {
    status: Mutex<IntentStatus>,
    counter: AtomicU64,
}

impl StubProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(IntentStatus::Succeeded),
            counter: AtomicU64::new(0),
        })
    }

    /// Sets the status reported for every subsequent intent lookup.
    pub fn set_status(&self, status: IntentStatus) {
        *self.status.lock().unwrap() = status;
    }

    fn current_status(&self) -> IntentStatus {
        *self.status.lock().unwrap()
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<ProviderIntent, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderIntent {
            id: format!("pi_test_{n}"),
            client_secret: Some(format!("pi_test_{n}_secret")),
            status: IntentStatus::RequiresPaymentMethod,
            amount_minor: request.amount_minor,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<ProviderIntent, ServiceError> {
        Ok(ProviderIntent {
            id: intent_id.to_string(),
            client_secret: None,
            status: self.current_status(),
            amount_minor: 0,
        })
    }
}

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Everything a test needs: services wired over an in-memory database.
pub struct TestApp {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub provider: Arc<StubProvider>,
    _event_rx: tokio::sync::mpsc::Receiver<events::Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            auto_migrate: true,
            payment_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            ..AppConfig::default()
        });

        let db = Arc::new(
            db::establish_connection(&config)
                .await
                .expect("in-memory database"),
        );

        let (event_sender, event_rx) = events::channel(64);
        let provider = StubProvider::new();
        let services = AppServices::new(
            db.clone(),
            config.clone(),
            Arc::new(event_sender),
            provider.clone(),
        );

        Self {
            db,
            config,
            services,
            provider,
            _event_rx: event_rx,
        }
    }

    /// Full axum router over the same database, for HTTP-level tests.
    pub fn router(&self) -> axum::Router {
        let (event_sender, event_rx) = events::channel(64);
        tokio::spawn(events::run_event_logger(event_rx));
        let state = Arc::new(storefront_api::AppState::new(
            self.db.clone(),
            self.config.clone(),
            Arc::new(event_sender),
            self.provider.clone(),
        ));
        storefront_api::router(state)
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductModel {
        let now = Utc::now();
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            category_id: Set(None),
            name: Set(name.to_string()),
            slug: Set(format!("{}-{}", name.to_lowercase().replace(' ', "-"), id.simple())),
            sku: Set(format!("SKU-{}", &id.simple().to_string()[..8])),
            description: Set(None),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    pub async fn deactivate_product(&self, product: &ProductModel) {
        let mut active: product::ActiveModel = product.clone().into();
        active.is_active = Set(false);
        active.update(&*self.db).await.expect("deactivate product");
    }

    pub async fn seed_variant(
        &self,
        product: &ProductModel,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> ProductVariantModel {
        let now = Utc::now();
        let id = Uuid::new_v4();
        product_variant::ActiveModel {
            id: Set(id),
            product_id: Set(product.id),
            sku: Set(format!("VAR-{}", &id.simple().to_string()[..8])),
            name: Set(name.to_string()),
            price: Set(price),
            stock: Set(stock),
            position: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed variant")
    }

    pub async fn seed_address(&self, user_id: Uuid) -> CustomerAddressModel {
        let now = Utc::now();
        customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            recipient: Set("Test Recipient".to_string()),
            address_line_1: Set("1 Example Street".to_string()),
            address_line_2: Set(None),
            city: Set("Springfield".to_string()),
            province: Set("IL".to_string()),
            country_code: Set("US".to_string()),
            postal_code: Set("62701".to_string()),
            phone: Set(None),
            is_default_shipping: Set(true),
            is_default_billing: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed address")
    }

    pub async fn seed_coupon(&self, seed: CouponSeed) -> CouponModel {
        let now = Utc::now();
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(seed.code),
            discount_type: Set(seed.discount_type),
            discount_value: Set(seed.discount_value),
            usage_limit: Set(seed.usage_limit),
            used_count: Set(seed.used_count),
            valid_from: Set(now - Duration::days(seed.valid_from_days_ago)),
            valid_to: Set(now + Duration::days(seed.valid_for_days)),
            min_purchase: Set(seed.min_purchase),
            max_discount: Set(seed.max_discount),
            is_active: Set(seed.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed coupon")
    }
}

/// Coupon fixture; defaults to an active 10% coupon with an open window.
pub struct CouponSeed {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from_days_ago: i64,
    pub valid_for_days: i64,
    pub min_purchase: Decimal,
    pub max_discount: Option<Decimal>,
    pub is_active: bool,
}

impl Default for CouponSeed {
    fn default() -> Self {
        Self {
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            usage_limit: None,
            used_count: 0,
            valid_from_days_ago: 1,
            valid_for_days: 30,
            min_purchase: Decimal::ZERO,
            max_discount: None,
            is_active: true,
        }
    }
}
