use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::{CreateIntentRequest, IntentStatus, PaymentProvider, ProviderIntent};
use crate::errors::ServiceError;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe payment-intent client.
///
/// Form-encoded calls against the payment_intents API, authenticated with the
/// secret key. Amounts are minor units throughout.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Points the gateway at a different API host (local mock servers).
    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    async fn parse_intent(&self, response: reqwest::Response) -> Result<ProviderIntent, ServiceError> {
        if response.status().is_success() {
            let intent: StripeIntent = response
                .json()
                .await
                .map_err(|e| ServiceError::ExternalServiceError(format!("stripe: {}", e)))?;
            Ok(ProviderIntent {
                status: IntentStatus::from_provider(&intent.status),
                id: intent.id,
                client_secret: intent.client_secret,
                amount_minor: intent.amount,
            })
        } else {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!("stripe error: {}", message);
            Err(ServiceError::ExternalServiceError(format!(
                "stripe: {}",
                message
            )))
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeGateway {
    #[instrument(skip(self), fields(order_number = %request.order_number))]
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<ProviderIntent, ServiceError> {
        let amount = request.amount_minor.to_string();
        let user_id = request.user_id.to_string();
        let params: Vec<(&str, &str)> = vec![
            ("amount", &amount),
            ("currency", &request.currency),
            ("metadata[order_number]", &request.order_number),
            ("metadata[user_id]", &user_id),
            ("receipt_email", &request.receipt_email),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("stripe: {}", e)))?;

        self.parse_intent(response).await
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<ProviderIntent, ServiceError> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{}", self.api_base, intent_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("stripe: {}", e)))?;

        self.parse_intent(response).await
    }
}
