use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Application configuration.
///
/// Loaded from `config/default.toml` (optional) with `STOREFRONT_`-prefixed
/// environment variables layered on top, e.g. `STOREFRONT_DATABASE_URL` or
/// `STOREFRONT_STRIPE_SECRET_KEY`.
///
/// Money-affecting knobs (`tax_rate`, `shipping_flat_fee`) are decimals, not
/// floats, so order totals stay exact end to end.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    /// Create missing tables from the entity definitions at startup.
    /// Intended for development and tests; production uses managed schema.
    #[serde(default)]
    pub auto_migrate: bool,

    /// Flat tax rate applied to every order subtotal.
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,
    /// Flat shipping fee charged per order.
    #[serde(default = "default_shipping_flat_fee")]
    pub shipping_flat_fee: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Days a shipped order dwells before the sweep promotes it to delivered.
    #[serde(default = "default_delivered_dwell_days")]
    pub delivered_dwell_days: i64,
    /// Hours of cart inactivity before the abandoned-cart sweep notifies.
    #[serde(default = "default_abandoned_cart_hours")]
    pub abandoned_cart_hours: i64,

    #[serde(default)]
    pub stripe_secret_key: String,
    #[serde(default)]
    pub stripe_publishable_key: String,
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,
    #[serde(default = "default_webhook_tolerance")]
    pub payment_webhook_tolerance_secs: u64,

    /// Optional HTTP sink for order-status notifications. Unset means
    /// notifications are logged only.
    #[serde(default)]
    pub notification_sink_url: Option<String>,

    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_database_url() -> String {
    "sqlite://storefront.db?mode=rwc".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_tax_rate() -> Decimal {
    dec!(0.10)
}
fn default_shipping_flat_fee() -> Decimal {
    dec!(10.00)
}
fn default_currency() -> String {
    "usd".to_string()
}
fn default_delivered_dwell_days() -> i64 {
    7
}
fn default_abandoned_cart_hours() -> i64 {
    24
}
fn default_webhook_tolerance() -> u64 {
    300
}
fn default_event_buffer() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            auto_migrate: false,
            tax_rate: default_tax_rate(),
            shipping_flat_fee: default_shipping_flat_fee(),
            currency: default_currency(),
            delivered_dwell_days: default_delivered_dwell_days(),
            abandoned_cart_hours: default_abandoned_cart_hours(),
            stripe_secret_key: String::new(),
            stripe_publishable_key: String::new(),
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance(),
            notification_sink_url: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::with_prefix("STOREFRONT"))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
