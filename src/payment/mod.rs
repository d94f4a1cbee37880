//! Payment-provider integration.
//!
//! The services talk to the processor through [`PaymentProvider`] so the
//! Stripe HTTP client can be swapped for a stub in tests.

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Request to create a payment intent with the external processor.
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    /// Amount in minor currency units (cents).
    pub amount_minor: i64,
    pub currency: String,
    pub order_number: String,
    pub user_id: Uuid,
    pub receipt_email: String,
}

/// Provider-side view of a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount_minor: i64,
}

/// Payment-intent status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    RequiresAction,
    Canceled,
    Unknown,
}

impl IntentStatus {
    pub fn from_provider(status: &str) -> Self {
        match status {
            "succeeded" => IntentStatus::Succeeded,
            "processing" => IntentStatus::Processing,
            "requires_payment_method" => IntentStatus::RequiresPaymentMethod,
            "requires_action" => IntentStatus::RequiresAction,
            "canceled" => IntentStatus::Canceled,
            _ => IntentStatus::Unknown,
        }
    }
}

/// External payment processor seam.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a payment intent for the given amount, tagged with the order
    /// number and user id so webhook events can be routed back to the order.
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<ProviderIntent, ServiceError>;

    /// Fetches the authoritative state of an existing intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<ProviderIntent, ServiceError>;
}
