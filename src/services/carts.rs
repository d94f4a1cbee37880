use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        cart, cart_item, product_variant, Cart, CartItem, CartModel, Product, ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::{available_stock, unit_price},
    services::notifications::NotificationService,
};

/// Shopping cart service.
///
/// One cart per user, created lazily. Lines reference products/variants by
/// id; unit and line prices are folded from the live catalog on every read,
/// never stored. Cart mutation checks stock but does not consume it — stock
/// is only decremented at order settlement.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    notifier: Arc<NotificationService>,
}

impl CartService {
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

    /// Returns the user's cart, creating an empty one on first access.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> Result<CartModel, ServiceError> {
        get_or_create_on(&*self.db, user_id).await
    }

    /// The user's cart with derived lines and totals.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartDetail, ServiceError> {
        let cart = get_or_create_on(&*self.db, user_id).await?;
        load_detail(&*self.db, cart).await
    }

    /// Adds a line to the cart, or increments an existing line for the same
    /// (product, variant) pair.
    #[instrument(skip(self))]
    pub async fn add_line(
        &self,
        user_id: Uuid,
        input: AddLineInput,
    ) -> Result<CartDetail, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = get_or_create_on(&txn, user_id).await?;

        let product = Product::find_by_id(input.product_id)
            .filter(crate::entities::product::Column::IsActive.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let variant = match input.variant_id {
            Some(variant_id) => {
                let variant = ProductVariant::find_by_id(variant_id)
                    .filter(product_variant::Column::ProductId.eq(product.id))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Variant not found".to_string()))?;
                Some(variant)
            }
            None => None,
        };

        let available = available_stock(&product, variant.as_ref());

        let mut query = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id));
        query = match input.variant_id {
            Some(variant_id) => query.filter(cart_item::Column::VariantId.eq(variant_id)),
            None => query.filter(cart_item::Column::VariantId.is_null()),
        };
        let existing = query.one(&txn).await?;

        let requested = existing.as_ref().map_or(0, |item| item.quantity) + input.quantity;
        if requested > available {
            return Err(ServiceError::InsufficientStock { available });
        }

        match existing {
            Some(item) => {
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(requested);
                item.updated_at = Set(Utc::now());
                item.update(&txn).await?;
            }
            None => {
                let item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    variant_id: Set(input.variant_id),
                    quantity: Set(input.quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                item.insert(&txn).await?;
            }
        }

        let cart = touch(&txn, cart).await?;
        let detail = load_detail(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: detail.cart.id,
                product_id: input.product_id,
                variant_id: input.variant_id,
            })
            .await;

        info!(
            "added to cart {}: product {} x{}",
            detail.cart.id, input.product_id, input.quantity
        );
        Ok(detail)
    }

    /// Sets the quantity of a line in the user's cart.
    #[instrument(skip(self))]
    pub async fn update_line(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartDetail, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let (cart, item) = find_owned_item(&txn, user_id, item_id).await?;

        let product = Product::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let variant = match item.variant_id {
            Some(variant_id) => ProductVariant::find_by_id(variant_id).one(&txn).await?,
            None => None,
        };

        let available = available_stock(&product, variant.as_ref());
        if quantity > available {
            return Err(ServiceError::InsufficientStock { available });
        }

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let cart = touch(&txn, cart).await?;
        let detail = load_detail(&txn, cart).await?;
        txn.commit().await?;

        Ok(detail)
    }

    /// Removes a line from the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_line(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, item) = find_owned_item(&txn, user_id, item_id).await?;

        CartItem::delete_by_id(item.id).exec(&txn).await?;

        let cart = touch(&txn, cart).await?;
        let detail = load_detail(&txn, cart).await?;
        txn.commit().await?;

        Ok(detail)
    }

    /// Removes every line from the user's cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = get_or_create_on(&txn, user_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart = touch(&txn, cart).await?;
        let detail = load_detail(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(detail.cart.id))
            .await;
        info!("cleared cart {}", detail.cart.id);
        Ok(detail)
    }

    /// Periodic sweep: notifies owners of carts untouched for longer than
    /// `idle_hours` that still hold lines. Each cart is nudged at most once
    /// per idle stretch; any cart activity clears `notified_at` and re-arms
    /// the nudge, so re-running the sweep never repeats a notification.
    #[instrument(skip(self))]
    pub async fn sweep_stale_carts(&self, idle_hours: i64) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::hours(idle_hours);
        let carts = Cart::find()
            .filter(cart::Column::UpdatedAt.lt(cutoff))
            .filter(cart::Column::NotifiedAt.is_null())
            .all(&*self.db)
            .await?;

        let mut notified = 0u64;
        for cart in carts {
            let lines = CartItem::find()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .all(&*self.db)
                .await?;
            if lines.is_empty() {
                continue;
            }
            let total_items: i32 = lines.iter().map(|line| line.quantity).sum();
            let cart_id = cart.id;
            let user_id = cart.user_id;

            // Stamp before the best-effort delivery; a cart is nudged at most
            // once even if the notification itself is dropped.
            let mut active: cart::ActiveModel = cart.into();
            active.notified_at = Set(Some(Utc::now()));
            active.update(&*self.db).await?;

            self.notifier
                .abandoned_cart(user_id, cart_id, total_items)
                .await;
            self.event_sender
                .send_or_log(Event::CartAbandoned(cart_id))
                .await;
            notified += 1;
        }

        info!("abandoned-cart sweep notified {} carts", notified);
        Ok(notified)
    }
}

async fn get_or_create_on(
    conn: &impl ConnectionTrait,
    user_id: Uuid,
) -> Result<CartModel, ServiceError> {
    if let Some(existing) = Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let cart = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        notified_at: Set(None),
    };
    Ok(cart.insert(conn).await?)
}

async fn find_owned_item(
    conn: &impl ConnectionTrait,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<(CartModel, cart_item::Model), ServiceError> {
    let item = CartItem::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

    let cart = Cart::find_by_id(item.cart_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

    // A line in someone else's cart is indistinguishable from a missing one.
    if cart.user_id != user_id {
        return Err(ServiceError::NotFound("Cart item not found".to_string()));
    }

    Ok((cart, item))
}

async fn touch(conn: &impl ConnectionTrait, cart: CartModel) -> Result<CartModel, ServiceError> {
    let mut active: cart::ActiveModel = cart.into();
    active.updated_at = Set(Utc::now());
    active.notified_at = Set(None);
    Ok(active.update(conn).await?)
}

/// Folds the cart's lines against live catalog prices into a value object.
pub(crate) async fn load_detail(
    conn: &impl ConnectionTrait,
    cart: CartModel,
) -> Result<CartDetail, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;

    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    let mut total_items = 0;

    for item in items {
        let product = Product::find_by_id(item.product_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let variant = match item.variant_id {
            Some(variant_id) => ProductVariant::find_by_id(variant_id).one(conn).await?,
            None => None,
        };

        let unit = unit_price(&product, variant.as_ref());
        let line_total = unit * Decimal::from(item.quantity);
        subtotal += line_total;
        total_items += item.quantity;

        lines.push(CartLine {
            item_id: item.id,
            product_id: product.id,
            variant_id: item.variant_id,
            product_name: product.name,
            sku: variant.as_ref().map_or(product.sku, |v| v.sku.clone()),
            quantity: item.quantity,
            unit_price: unit,
            line_total,
        });
    }

    Ok(CartDetail {
        cart,
        lines,
        subtotal,
        total_items,
    })
}

/// Input for adding a cart line
#[derive(Debug, Deserialize)]
pub struct AddLineInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

/// One cart line with derived pricing
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Cart snapshot with derived totals
#[derive(Debug, Serialize)]
pub struct CartDetail {
    pub cart: CartModel,
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub total_items: i32,
}
