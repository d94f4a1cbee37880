use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Backend for a small e-commerce storefront: catalog browsing, per-user carts,
coupon validation, checkout settlement, and payment reconciliation against an
external processor.

## Identity

Upstream authentication is handled by the gateway in front of this service.
Authenticated endpoints read the caller's id from the `x-user-id` header:

```
x-user-id: 6f1b0c9e-8d2a-4f3b-9c47-2f6a1e5d8b30
```

The payments webhook is the only unauthenticated endpoint; deliveries are
verified against the configured signing secret instead.
"#,
        contact(name = "Storefront Team")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::validate_coupon,
        crate::handlers::payments::create_intent,
        crate::handlers::payments::confirm_payment,
        crate::handlers::payments::webhook,
        crate::handlers::health::health,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::carts::AddItemRequest,
        crate::handlers::carts::UpdateItemRequest,
        crate::handlers::orders::CreateOrderRequest,
        crate::handlers::orders::ValidateCouponRequest,
        crate::handlers::payments::PaymentOrderRequest,
        crate::services::DiscountResult,
        crate::services::PaymentIntentResponse,
    )),
    tags(
        (name = "products", description = "Catalog browsing"),
        (name = "cart", description = "Per-user cart operations"),
        (name = "orders", description = "Checkout and order history"),
        (name = "coupons", description = "Discount preview"),
        (name = "payments", description = "Payment intents and reconciliation"),
        (name = "health", description = "Service probes"),
    )
)]
pub struct ApiDoc;
