mod common;

use common::{CouponSeed, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    entities::{cart_item, order_item, CartItem, Coupon, DiscountType, OrderItem, OrderStatus,
        PaymentStatus, Product},
    errors::ServiceError,
    services::{AddLineInput, CreateOrderInput},
};
use uuid::Uuid;

fn order_input(shipping: Uuid, billing: Uuid, coupon: Option<&str>) -> CreateOrderInput {
    CreateOrderInput {
        shipping_address_id: shipping,
        billing_address_id: billing,
        coupon_code: coupon.map(str::to_string),
        email: "buyer@example.com".to_string(),
        phone: None,
        customer_notes: None,
    }
}

#[tokio::test]
async fn settlement_computes_totals_and_clears_cart() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Widget", dec!(50.00), 10).await;
    let address = app.seed_address(user_id).await;

    app.services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: product.id,
                variant_id: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let result = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, None))
        .await
        .unwrap();

    // 100.00 subtotal + 10% tax + 10.00 flat shipping.
    assert_eq!(result.order.subtotal, dec!(100.00));
    assert_eq!(result.order.tax, dec!(10.00));
    assert_eq!(result.order.shipping_cost, dec!(10.00));
    assert_eq!(result.order.discount, dec!(0));
    assert_eq!(result.order.total, dec!(120.00));
    assert_eq!(result.order.status, OrderStatus::Pending);
    assert_eq!(result.order.payment_status, PaymentStatus::Pending);
    assert!(result.order.order_number.starts_with("ORD-"));

    // Line snapshot captured price and name.
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].unit_price, dec!(50.00));
    assert_eq!(result.items[0].total_price, dec!(100.00));
    assert_eq!(result.items[0].product_name, "Widget");

    // Stock consumed from the authoritative row.
    let fresh = Product::find_by_id(product.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.stock, 8);

    // Cart emptied.
    let cart = app.services.carts.get_cart(user_id).await.unwrap();
    assert!(cart.lines.is_empty());
}

#[tokio::test]
async fn percentage_coupon_with_cap_is_applied_and_redeemed() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Widget", dec!(100.00), 10).await;
    let address = app.seed_address(user_id).await;
    let coupon = app
        .seed_coupon(CouponSeed {
            code: "SAVE20".to_string(),
            discount_value: dec!(20),
            max_discount: Some(dec!(15.00)),
            usage_limit: Some(10),
            ..CouponSeed::default()
        })
        .await;

    app.services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: product.id,
                variant_id: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let result = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, Some("SAVE20")))
        .await
        .unwrap();

    // 20% of 100.00 would be 20.00; the cap holds it at 15.00.
    assert_eq!(result.order.discount, dec!(15.00));
    assert_eq!(result.order.total, dec!(105.00));
    assert_eq!(result.order.coupon_code.as_deref(), Some("SAVE20"));

    let fresh = Coupon::find_by_id(coupon.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.used_count, 1);
}

#[tokio::test]
async fn rejected_coupon_rolls_back_the_whole_settlement() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Widget", dec!(50.00), 10).await;
    let address = app.seed_address(user_id).await;
    let coupon = app
        .seed_coupon(CouponSeed {
            code: "SPENT".to_string(),
            usage_limit: Some(1),
            used_count: 1,
            ..CouponSeed::default()
        })
        .await;

    app.services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: product.id,
                variant_id: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let err = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, Some("SPENT")))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CouponUsageLimitReached));

    // Nothing happened: no order rows, stock intact, counter intact, cart intact.
    let items = OrderItem::find()
        .filter(order_item::Column::ProductId.eq(product.id))
        .all(&*app.db)
        .await
        .unwrap();
    assert!(items.is_empty());

    let fresh_product = Product::find_by_id(product.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh_product.stock, 10);

    let fresh_coupon = Coupon::find_by_id(coupon.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh_coupon.used_count, 1);

    let cart = app.services.carts.get_cart(user_id).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
}

#[tokio::test]
async fn stale_cart_line_fails_settlement_when_stock_ran_out() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Scarce", dec!(30.00), 5).await;
    let address = app.seed_address(user_id).await;

    app.services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: product.id,
                variant_id: None,
                quantity: 5,
            },
        )
        .await
        .unwrap();

    // Stock drops after the line was added; settlement re-checks.
    use sea_orm::{ActiveModelTrait, Set};
    let mut active: storefront_api::entities::product::ActiveModel = product.clone().into();
    active.stock = Set(3);
    active.update(&*app.db).await.unwrap();

    let err = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock { available: 3 }));

    // The cart is preserved for the caller to adjust.
    let cart_lines = CartItem::find()
        .filter(cart_item::Column::ProductId.eq(product.id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(cart_lines.len(), 1);
    assert_eq!(cart_lines[0].quantity, 5);
}

#[tokio::test]
async fn empty_cart_cannot_settle() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let address = app.seed_address(user_id).await;

    // No cart at all.
    let err = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EmptyCart));

    // An existing-but-empty cart behaves the same.
    app.services.carts.get_or_create_cart(user_id).await.unwrap();
    let err = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EmptyCart));
}

#[tokio::test]
async fn foreign_address_is_rejected() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Widget", dec!(50.00), 10).await;
    let foreign_address = app.seed_address(Uuid::new_v4()).await;

    app.services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: product.id,
                variant_id: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let err = app
        .services
        .checkout
        .create_order(
            user_id,
            order_input(foreign_address.id, foreign_address.id, None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn variant_line_consumes_variant_stock_only() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Shirt", dec!(20.00), 50).await;
    let variant = app.seed_variant(&product, "Shirt XL", dec!(24.00), 5).await;
    let address = app.seed_address(user_id).await;

    app.services
        .carts
        .add_line(
            user_id,
            AddLineInput {
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let result = app
        .services
        .checkout
        .create_order(user_id, order_input(address.id, address.id, None))
        .await
        .unwrap();

    assert_eq!(result.order.subtotal, dec!(48.00));
    assert_eq!(result.items[0].product_sku, variant.sku);

    let fresh_variant = storefront_api::entities::ProductVariant::find_by_id(variant.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh_variant.stock, 3);

    let fresh_product = Product::find_by_id(product.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh_product.stock, 50);
}

#[tokio::test]
async fn shared_products_settle_regardless_of_cart_order() {
    let app = TestApp::new().await;
    let widget = app.seed_product("Widget", dec!(50.00), 10).await;
    let gadget = app.seed_product("Gadget", dec!(30.00), 10).await;

    // Two buyers share both products, added in opposite orders; the lock
    // loop canonicalizes the row order so both settlements go through.
    let first_user = Uuid::new_v4();
    let second_user = Uuid::new_v4();
    for (user, products) in [
        (first_user, [widget.id, gadget.id]),
        (second_user, [gadget.id, widget.id]),
    ] {
        for product_id in products {
            app.services
                .carts
                .add_line(
                    user,
                    AddLineInput {
                        product_id,
                        variant_id: None,
                        quantity: 2,
                    },
                )
                .await
                .unwrap();
        }
        let address = app.seed_address(user).await;
        let result = app
            .services
            .checkout
            .create_order(user, order_input(address.id, address.id, None))
            .await
            .unwrap();
        assert_eq!(result.order.subtotal, dec!(160.00));
        assert_eq!(result.items.len(), 2);
    }

    for product_id in [widget.id, gadget.id] {
        let fresh = Product::find_by_id(product_id)
            .one(&*app.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.stock, 6);
    }
}
