//! sea-orm entities for the storefront data model.

pub mod cart;
pub mod cart_item;
pub mod category;
pub mod coupon;
pub mod customer_address;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod product;
pub mod product_variant;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use coupon::{DiscountType, Entity as Coupon, Model as CouponModel};
pub use customer_address::{Entity as CustomerAddress, Model as CustomerAddressModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_status_history::{Entity as OrderStatusHistory, Model as OrderStatusHistoryModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
