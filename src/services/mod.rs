//! Business services.
//!
//! Each service owns one slice of the workflow and talks to the database
//! through a shared [`sea_orm::DatabaseConnection`]. Cross-service calls go
//! through `Arc`s wired up in [`crate::handlers::AppServices`].

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod payments;

pub use carts::{AddLineInput, CartDetail, CartLine, CartService};
pub use catalog::{CatalogService, CreateProductInput, CreateVariantInput};
pub use checkout::{CheckoutService, CreateOrderInput, OrderWithItems};
pub use coupons::{CouponService, DiscountResult};
pub use notifications::NotificationService;
pub use orders::{OrderDetail, OrderService};
pub use payments::{PaymentEvent, PaymentIntentResponse, PaymentService};
