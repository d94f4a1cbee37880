use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order, order_item, order_status_history, Order, OrderItem, OrderItemModel, OrderModel,
        OrderStatus, OrderStatusHistory, OrderStatusHistoryModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::notifications::NotificationService,
};

/// Order lifecycle service: user-scoped reads and the status state machine.
///
/// Every transition appends an [`OrderStatusHistory`] row; history is
/// append-only and never edited. Status notifications are best-effort and
/// cannot roll a transition back.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    notifier: Arc<NotificationService>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifier,
        }
    }

    /// The user's orders, newest first.
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    /// One order with items and status history, scoped to the owning user.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        let history = OrderStatusHistory::find()
            .filter(order_status_history::Column::OrderId.eq(order.id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(OrderDetail {
            order,
            items,
            history,
        })
    }

    /// Drives the order through the state machine and appends history.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = ?new_status))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: Option<Uuid>,
        note: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        let updated = apply_transition(&txn, order, new_status, actor, note).await?;
        txn.commit().await?;

        self.after_transition(&updated, old_status, new_status).await;
        Ok(updated)
    }

    /// Marks an order shipped, recording the tracking number with the
    /// transition.
    #[instrument(skip(self))]
    pub async fn mark_shipped(
        &self,
        order_id: Uuid,
        tracking_number: Option<String>,
        actor: Option<Uuid>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let order = match tracking_number {
            Some(tracking) => {
                let mut active: order::ActiveModel = order.into();
                active.tracking_number = Set(Some(tracking));
                active.update(&txn).await?
            }
            None => order,
        };

        let old_status = order.status;
        let updated = apply_transition(
            &txn,
            order,
            OrderStatus::Shipped,
            actor,
            Some("Order shipped".to_string()),
        )
        .await?;
        txn.commit().await?;

        self.after_transition(&updated, old_status, OrderStatus::Shipped)
            .await;
        Ok(updated)
    }

    /// Time-based sweep: shipped orders older than the dwell period are
    /// auto-promoted to delivered. Idempotent — promoted rows no longer match
    /// the status filter on the next run.
    #[instrument(skip(self))]
    pub async fn promote_delivered(&self, dwell_days: i64) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::days(dwell_days);
        let shipped = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Shipped))
            .filter(order::Column::ShippedAt.lte(cutoff))
            .all(&*self.db)
            .await?;

        let mut promoted = 0u64;
        for order in shipped {
            let txn = self.db.begin().await?;
            let old_status = order.status;
            let updated = apply_transition(
                &txn,
                order,
                OrderStatus::Delivered,
                None,
                Some(format!("Auto-delivered after {} days", dwell_days)),
            )
            .await?;
            txn.commit().await?;

            self.after_transition(&updated, old_status, OrderStatus::Delivered)
                .await;
            promoted += 1;
        }

        if promoted > 0 {
            info!("delivery sweep promoted {} orders", promoted);
        }
        Ok(promoted)
    }

    async fn after_transition(
        &self,
        order: &OrderModel,
        old_status: OrderStatus,
        new_status: OrderStatus,
    ) {
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.as_str().to_string(),
                new_status: new_status.as_str().to_string(),
            })
            .await;
        self.notifier
            .order_status(&order.email, &order.order_number, new_status)
            .await;
    }
}

/// Applies one state-machine step and appends the audit row. Used by the
/// lifecycle service and the payment reconciliation path so the transition
/// rules live in one place.
pub(crate) async fn apply_transition(
    conn: &impl ConnectionTrait,
    order: OrderModel,
    new_status: OrderStatus,
    actor: Option<Uuid>,
    note: Option<String>,
) -> Result<OrderModel, ServiceError> {
    let old_status = order.status;
    if !old_status.can_transition_to(new_status) {
        return Err(ServiceError::InvalidOperation(format!(
            "Cannot transition from '{}' to '{}'",
            old_status.as_str(),
            new_status.as_str()
        )));
    }

    let now = Utc::now();
    let mut active: order::ActiveModel = order.into();
    active.status = Set(new_status);
    active.updated_at = Set(now);
    match new_status {
        OrderStatus::Shipped => active.shipped_at = Set(Some(now)),
        OrderStatus::Delivered => active.delivered_at = Set(Some(now)),
        _ => {}
    }
    let updated = active.update(conn).await?;

    append_history(conn, updated.id, new_status, actor, note).await?;

    info!(
        "order {} status: {} -> {}",
        updated.order_number,
        old_status.as_str(),
        new_status.as_str()
    );
    Ok(updated)
}

/// Appends one append-only history row.
pub(crate) async fn append_history(
    conn: &impl ConnectionTrait,
    order_id: Uuid,
    status: OrderStatus,
    actor: Option<Uuid>,
    note: Option<String>,
) -> Result<(), ServiceError> {
    let row = order_status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        status: Set(status),
        note: Set(note),
        created_by: Set(actor),
        created_at: Set(Utc::now()),
    };
    row.insert(conn).await?;
    Ok(())
}

/// Order with lines and audit trail
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    pub history: Vec<OrderStatusHistoryModel>,
}
