use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order entity — an immutable snapshot of a purchase.
///
/// Monetary columns and line items are fixed at settlement time; only
/// `status`, `payment_status`, the lifecycle timestamps, and the payment
/// reference mutate afterwards. Orders are never deleted in normal operation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_id: Uuid,
    pub email: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub tax: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub total: Decimal,
    pub currency: String,
    #[sea_orm(nullable)]
    pub coupon_code: Option<String>,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    #[sea_orm(column_type = "Text", nullable)]
    pub customer_notes: Option<String>,
    #[sea_orm(nullable)]
    pub payment_method: Option<String>,
    /// External payment-intent reference.
    #[sea_orm(nullable)]
    pub transaction_id: Option<String>,
    #[sea_orm(nullable)]
    pub tracking_number: Option<String>,
    #[sea_orm(nullable)]
    pub paid_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order fulfillment status state machine:
/// pending → processing → shipped → delivered, with cancelled reachable from
/// any pre-delivered state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Whether the state machine permits moving from `self` to `to`.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, to) {
            (Pending, Processing) => true,
            (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            (Pending | Processing | Shipped, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment reconciliation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}
