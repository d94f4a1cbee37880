use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services after their writes commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    },
    CartCleared(Uuid),
    CartAbandoned(Uuid),

    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    CouponRedeemed {
        coupon_id: Uuid,
        order_id: Uuid,
    },

    PaymentIntentCreated {
        order_id: Uuid,
        intent_id: String,
    },
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),
}

/// Cloneable handle for publishing [`Event`]s onto the process-wide channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort send. Event delivery is never allowed to fail a request,
    /// so a closed or full channel is logged and dropped.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("event dropped: {}", e);
        }
    }
}

/// Creates the event channel used by [`EventSender`].
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Stands in for a real
/// downstream consumer (outbox, analytics, email pipeline).
pub async fn run_event_logger(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "domain event");
    }
}
