use axum::http::HeaderMap;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{order, Order, OrderModel, OrderStatus, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    payment::{webhook, CreateIntentRequest, IntentStatus, PaymentProvider},
    services::{notifications::NotificationService, orders},
};

/// A payment outcome observed from the processor, either by a synchronous
/// confirmation lookup or an asynchronous webhook delivery.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    /// The processor reports the intent settled. Carries the intent id so the
    /// order's payment reference can be backfilled when it is missing.
    Succeeded { reference: String },
    Failed,
}

/// Payment reconciliation service.
///
/// Both entry points — synchronous confirmation and the webhook — converge on
/// [`payment_transition`], so redelivered or duplicated events apply at most
/// one state change.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    provider: Arc<dyn PaymentProvider>,
    event_sender: Arc<EventSender>,
    notifier: Arc<NotificationService>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        provider: Arc<dyn PaymentProvider>,
        event_sender: Arc<EventSender>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            db,
            config,
            provider,
            event_sender,
            notifier,
        }
    }

    /// Creates a payment intent with the processor for an unpaid order and
    /// stores the intent id as the order's payment reference.
    #[instrument(skip(self))]
    pub async fn create_intent(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<PaymentIntentResponse, ServiceError> {
        let order = self.find_user_order(user_id, order_number).await?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is already paid",
                order.order_number
            )));
        }

        let amount_minor = to_minor_units(order.total)?;
        let intent = self
            .provider
            .create_intent(CreateIntentRequest {
                amount_minor,
                currency: order.currency.clone(),
                order_number: order.order_number.clone(),
                user_id,
                receipt_email: order.email.clone(),
            })
            .await?;

        let order_id = order.id;
        let mut active: order::ActiveModel = order.into();
        active.transaction_id = Set(Some(intent.id.clone()));
        active.payment_method = Set(Some("stripe".to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentIntentCreated {
                order_id,
                intent_id: intent.id.clone(),
            })
            .await;

        Ok(PaymentIntentResponse {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            publishable_key: self.config.stripe_publishable_key.clone(),
            amount_minor,
        })
    }

    /// Synchronous confirmation: re-fetches the intent from the processor and
    /// reconciles the order against its authoritative status. The client's
    /// claim of success is never trusted directly.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.find_user_order(user_id, order_number).await?;

        let intent_id = order
            .transaction_id
            .clone()
            .ok_or(ServiceError::PaymentVerificationFailed)?;
        let intent = self.provider.retrieve_intent(&intent_id).await?;
        if intent.status != IntentStatus::Succeeded {
            return Err(ServiceError::PaymentVerificationFailed);
        }

        self.apply_event(order, PaymentEvent::Succeeded { reference: intent.id })
            .await
    }

    /// Webhook entry point: authenticates the delivery, extracts the order
    /// reference from intent metadata, and reconciles.
    ///
    /// Deliveries for unknown orders or event types are acknowledged without
    /// effect so the processor stops retrying them. A missing webhook secret
    /// rejects every delivery rather than accepting them unverified.
    #[instrument(skip(self, headers, payload))]
    pub async fn handle_webhook(
        &self,
        headers: &HeaderMap,
        payload: &[u8],
    ) -> Result<(), ServiceError> {
        let Some(secret) = self.config.payment_webhook_secret.as_deref() else {
            warn!("webhook delivery rejected: no webhook secret configured");
            return Err(ServiceError::AuthenticationError(
                "webhook verification unavailable".to_string(),
            ));
        };
        if !webhook::verify_signature(
            headers,
            payload,
            secret,
            self.config.payment_webhook_tolerance_secs,
        ) {
            return Err(ServiceError::AuthenticationError(
                "invalid webhook signature".to_string(),
            ));
        }

        let delivery: WebhookDelivery = serde_json::from_slice(payload)
            .map_err(|err| ServiceError::BadRequest(format!("malformed webhook body: {err}")))?;

        let event = match delivery.event_type.as_str() {
            "payment_intent.succeeded" => PaymentEvent::Succeeded {
                reference: delivery.data.object.id.clone(),
            },
            "payment_intent.payment_failed" => PaymentEvent::Failed,
            other => {
                info!("ignoring webhook event type {}", other);
                return Ok(());
            }
        };

        let Some(order_number) = delivery.data.object.metadata.order_number else {
            warn!("webhook intent {} has no order metadata", delivery.data.object.id);
            return Ok(());
        };

        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number.as_str()))
            .one(&*self.db)
            .await?;
        let Some(order) = order else {
            warn!("webhook references unknown order {}", order_number);
            return Ok(());
        };

        self.apply_event(order, event).await?;
        Ok(())
    }

    /// Applies a payment event inside a transaction and fires the side
    /// effects only when a state change actually happened.
    async fn apply_event(
        &self,
        order: OrderModel,
        event: PaymentEvent,
    ) -> Result<OrderModel, ServiceError> {
        let succeeded = matches!(event, PaymentEvent::Succeeded { .. });

        let txn = self.db.begin().await?;
        let (updated, changed) = payment_transition(&txn, order, event).await?;
        txn.commit().await?;

        if changed {
            if succeeded {
                self.event_sender
                    .send_or_log(Event::PaymentSucceeded(updated.id))
                    .await;
                self.notifier
                    .order_status(&updated.email, &updated.order_number, updated.status)
                    .await;
            } else {
                self.event_sender
                    .send_or_log(Event::PaymentFailed(updated.id))
                    .await;
            }
        }
        Ok(updated)
    }

    async fn find_user_order(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<OrderModel, ServiceError> {
        Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))
    }
}

/// The single place payment state changes.
///
/// Returns the (possibly updated) order and whether anything changed. Already
/// settled orders absorb repeated events without touching the row, which makes
/// confirmation retries and webhook redeliveries idempotent.
pub(crate) async fn payment_transition(
    conn: &impl ConnectionTrait,
    order: OrderModel,
    event: PaymentEvent,
) -> Result<(OrderModel, bool), ServiceError> {
    match event {
        PaymentEvent::Succeeded { reference } => {
            if order.payment_status == PaymentStatus::Paid {
                return Ok((order, false));
            }

            let order_id = order.id;
            let now = Utc::now();
            let promote = order.status == OrderStatus::Pending;
            let current_status = order.status;
            let needs_reference = order.transaction_id.is_none();

            let mut active: order::ActiveModel = order.into();
            active.payment_status = Set(PaymentStatus::Paid);
            active.paid_at = Set(Some(now));
            active.updated_at = Set(now);
            if needs_reference {
                active.transaction_id = Set(Some(reference));
            }
            if promote {
                active.status = Set(OrderStatus::Processing);
            }
            let updated = active.update(conn).await?;

            // The history row records the money movement even when the order
            // is past pending (e.g. a late event for a cancelled order) and
            // no promotion happens.
            let history_status = if promote {
                OrderStatus::Processing
            } else {
                current_status
            };
            orders::append_history(
                conn,
                order_id,
                history_status,
                None,
                Some("Payment received successfully".to_string()),
            )
            .await?;

            info!("order {} marked paid", updated.order_number);
            Ok((updated, true))
        }
        PaymentEvent::Failed => {
            if order.payment_status == PaymentStatus::Failed {
                return Ok((order, false));
            }

            let order_id = order.id;
            let status = order.status;
            let mut active: order::ActiveModel = order.into();
            active.payment_status = Set(PaymentStatus::Failed);
            active.updated_at = Set(Utc::now());
            let updated = active.update(conn).await?;

            orders::append_history(
                conn,
                order_id,
                status,
                None,
                Some("Payment failed".to_string()),
            )
            .await?;

            warn!("order {} payment failed", updated.order_number);
            Ok((updated, true))
        }
    }
}

/// Converts a decimal major-unit amount to integer minor units (cents).
fn to_minor_units(total: Decimal) -> Result<i64, ServiceError> {
    (total * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError("order total out of range".to_string()))
}

/// Returned to the client so it can drive the processor's payment UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub publishable_key: String,
    pub amount_minor: i64,
}

#[derive(Debug, Deserialize)]
struct WebhookDelivery {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookIntent,
}

#[derive(Debug, Deserialize)]
struct WebhookIntent {
    id: String,
    #[serde(default)]
    metadata: WebhookMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookMetadata {
    #[serde(default)]
    order_number: Option<String>,
}
