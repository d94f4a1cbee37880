use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    entities::{
        cart_item, customer_address, order, order_item, order_status_history, CartItem,
        CustomerAddress, OrderItemModel, OrderModel, OrderStatus, PaymentStatus, Product,
        ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        carts,
        coupons::{self, CouponService, DiscountResult},
    },
};

/// Order settlement: converts a cart into an immutable order.
///
/// The whole workflow — coupon redemption, order and line creation, stock
/// decrement, cart clearing — runs in one database transaction. Any failure
/// rolls everything back, so a rejected coupon or a stock shortfall leaves
/// the cart, the stock counters, and the coupon untouched and the caller
/// free to retry.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    coupons: Arc<CouponService>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        coupons: Arc<CouponService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            config,
            coupons,
            event_sender,
        }
    }

    /// Settles the user's cart into an order.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart_model = crate::entities::Cart::find()
            .filter(crate::entities::cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;
        let cart = carts::load_detail(&txn, cart_model).await?;

        if cart.lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let shipping_address =
            find_owned_address(&txn, user_id, input.shipping_address_id).await?;
        let billing_address = find_owned_address(&txn, user_id, input.billing_address_id).await?;

        // Lock every authoritative stock row up front; concurrent settlements
        // against the same products serialize here instead of racing the
        // read-then-decrement. Locks are taken in (product, variant) order so
        // two settlements sharing products cannot deadlock each other.
        let mut lines: Vec<&carts::CartLine> = cart.lines.iter().collect();
        lines.sort_by_key(|line| (line.product_id, line.variant_id));

        let mut locked_lines = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;
        for line in lines {
            let product = Product::find_by_id(line.product_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
            let variant = match line.variant_id {
                Some(variant_id) => Some(
                    ProductVariant::find_by_id(variant_id)
                        .lock_exclusive()
                        .one(&txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound("Variant not found".to_string()))?,
                ),
                None => None,
            };

            let available = crate::services::catalog::available_stock(&product, variant.as_ref());
            if line.quantity > available {
                return Err(ServiceError::InsufficientStock { available });
            }

            let unit_price = crate::services::catalog::unit_price(&product, variant.as_ref());
            subtotal += unit_price * Decimal::from(line.quantity);
            locked_lines.push(LockedLine {
                quantity: line.quantity,
                unit_price,
                product,
                variant,
            });
        }

        let tax = subtotal * self.config.tax_rate;
        let shipping_cost = self.config.shipping_flat_fee;

        let applied_coupon: Option<DiscountResult> = match input.coupon_code.as_deref() {
            Some(code) => Some(coupons::evaluate_on(&txn, code, subtotal, Utc::now()).await?),
            None => None,
        };
        let discount = applied_coupon
            .as_ref()
            .map_or(Decimal::ZERO, |result| result.discount);

        let total = subtotal + tax + shipping_cost - discount;

        let order_id = Uuid::new_v4();
        let order_number = generate_order_number(order_id);
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            email: Set(input.email.clone()),
            phone: Set(input.phone.clone()),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            subtotal: Set(subtotal),
            tax: Set(tax),
            shipping_cost: Set(shipping_cost),
            discount: Set(discount),
            total: Set(total),
            currency: Set(self.config.currency.clone()),
            coupon_code: Set(applied_coupon.as_ref().map(|c| c.code.clone())),
            shipping_address_id: Set(shipping_address.id),
            billing_address_id: Set(billing_address.id),
            customer_notes: Set(input.customer_notes.clone()),
            payment_method: Set(None),
            transaction_id: Set(None),
            tracking_number: Set(None),
            paid_at: Set(None),
            shipped_at: Set(None),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        // Line snapshots: name/sku/price captured now, immune to later
        // catalog edits.
        let mut items = Vec::with_capacity(locked_lines.len());
        for line in &locked_lines {
            let sku = line
                .variant
                .as_ref()
                .map_or_else(|| line.product.sku.clone(), |v| v.sku.clone());
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product.id),
                variant_id: Set(line.variant.as_ref().map(|v| v.id)),
                product_name: Set(line.product.name.clone()),
                product_sku: Set(sku),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.unit_price * Decimal::from(line.quantity)),
                created_at: Set(now),
            };
            items.push(item.insert(&txn).await?);
        }

        // Consume stock from the authoritative counter per line.
        for line in locked_lines {
            match line.variant {
                Some(variant) => {
                    let stock = variant.stock;
                    let mut active: crate::entities::product_variant::ActiveModel = variant.into();
                    active.stock = Set(stock - line.quantity);
                    active.updated_at = Set(Utc::now());
                    active.update(&txn).await?;
                }
                None => {
                    let stock = line.product.stock;
                    let mut active: crate::entities::product::ActiveModel = line.product.into();
                    active.stock = Set(stock - line.quantity);
                    active.updated_at = Set(Utc::now());
                    active.update(&txn).await?;
                }
            }
        }

        if let Some(result) = &applied_coupon {
            self.coupons.redeem(&txn, result.coupon_id).await?;
        }

        let history = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(OrderStatus::Pending),
            note: Set(Some("Order created".to_string())),
            created_by: Set(Some(user_id)),
            created_at: Set(now),
        };
        history.insert(&txn).await?;

        // Emptying the cart is the observable signal that checkout succeeded.
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.cart.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        if let Some(result) = &applied_coupon {
            self.event_sender
                .send_or_log(Event::CouponRedeemed {
                    coupon_id: result.coupon_id,
                    order_id,
                })
                .await;
        }

        info!(
            "order {} settled from cart {}: total {}",
            order_number, cart.cart.id, total
        );
        Ok(OrderWithItems { order, items })
    }
}

struct LockedLine {
    quantity: i32,
    unit_price: Decimal,
    product: crate::entities::ProductModel,
    variant: Option<crate::entities::ProductVariantModel>,
}

async fn find_owned_address(
    conn: &impl sea_orm::ConnectionTrait,
    user_id: Uuid,
    address_id: Uuid,
) -> Result<crate::entities::CustomerAddressModel, ServiceError> {
    CustomerAddress::find_by_id(address_id)
        .filter(customer_address::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))
}

fn generate_order_number(order_id: Uuid) -> String {
    let hex = order_id.simple().to_string();
    format!("ORD-{}", hex[..8].to_uppercase())
}

/// Input for creating an order from the caller's cart
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub coupon_code: Option<String>,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub customer_notes: Option<String>,
}

/// A settled order with its line snapshots
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_number_is_prefixed_uppercase_hex() {
        let id = Uuid::new_v4();
        let number = generate_order_number(id);
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 12);
        assert!(number[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn totals_add_up() {
        let subtotal = dec!(100.00);
        let tax = subtotal * dec!(0.10);
        let shipping = dec!(10.00);
        let discount = Decimal::ZERO;
        assert_eq!(subtotal + tax + shipping - discount, dec!(120.00));
    }
}
