use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::AppConfig, entities::OrderStatus};

/// Outbound customer notifications.
///
/// Messages are posted to an HTTP sink when one is configured; without a sink
/// they are logged and dropped. Delivery is best-effort by design: a
/// notification failure never fails the operation that triggered it.
pub struct NotificationService {
    client: Client,
    sink_url: Option<String>,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            sink_url: config.notification_sink_url.clone(),
        }
    }

    /// Notifies the customer about an order status change.
    pub async fn order_status(&self, recipient: &str, order_number: &str, status: OrderStatus) {
        let body = match status_message(status) {
            Some(message) => message,
            None => return,
        };
        self.deliver(json!({
            "kind": "order_status",
            "recipient": recipient,
            "order_number": order_number,
            "status": status.as_str(),
            "message": body,
        }))
        .await;
    }

    /// Nudges the owner of a cart that has gone idle.
    pub async fn abandoned_cart(&self, user_id: Uuid, cart_id: Uuid, total_items: i32) {
        self.deliver(json!({
            "kind": "abandoned_cart",
            "user_id": user_id,
            "cart_id": cart_id,
            "total_items": total_items,
            "message": "You left items in your cart",
        }))
        .await;
    }

    async fn deliver(&self, payload: serde_json::Value) {
        let Some(url) = self.sink_url.as_deref() else {
            debug!("notification (no sink configured): {}", payload);
            return;
        };
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!("notification sink returned {}", response.status());
            }
            Err(err) => {
                warn!("notification delivery failed: {}", err);
            }
        }
    }
}

fn status_message(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Processing => Some("Your order is being processed"),
        OrderStatus::Shipped => Some("Your order has been shipped"),
        OrderStatus::Delivered => Some("Your order has been delivered"),
        OrderStatus::Cancelled => Some("Your order has been cancelled"),
        OrderStatus::Pending => None,
    }
}
