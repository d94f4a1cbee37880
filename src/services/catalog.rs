use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{product, product_variant, Product, ProductModel, ProductVariant, ProductVariantModel},
    errors::ServiceError,
};

/// Catalog service: products, variants, and their authoritative stock/price.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(input.category_id),
            name: Set(input.name),
            slug: Set(input.slug),
            sku: Set(input.sku),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;
        info!("created product {} ({})", product.id, product.sku);
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn create_variant(
        &self,
        input: CreateVariantInput,
    ) -> Result<ProductVariantModel, ServiceError> {
        // The parent must exist; a variant without a product is unreachable.
        Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let now = Utc::now();
        let variant = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            sku: Set(input.sku),
            name: Set(input.name),
            price: Set(input.price),
            stock: Set(input.stock),
            position: Set(input.position),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let variant = variant.insert(&*self.db).await?;
        info!("created variant {} ({})", variant.id, variant.sku);
        Ok(variant)
    }

    /// Fetches a product with its variants.
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let variants = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::Position)
            .all(&*self.db)
            .await?;

        Ok(ProductDetail { product, variants })
    }

    /// Lists products newest first, optionally restricted to active ones.
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
        active_only: bool,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut query = Product::find().order_by_desc(product::Column::CreatedAt);
        if active_only {
            query = query.filter(product::Column::IsActive.eq(true));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }
}

/// Stock available for a cart line: the variant's when one is chosen,
/// else the product's.
pub fn available_stock(product: &ProductModel, variant: Option<&ProductVariantModel>) -> i32 {
    variant.map_or(product.stock, |v| v.stock)
}

/// Unit price for a cart line, same authority rule as [`available_stock`].
pub fn unit_price(product: &ProductModel, variant: Option<&ProductVariantModel>) -> Decimal {
    variant.map_or(product.price, |v| v.price)
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Input for creating a product variant
#[derive(Debug, Deserialize)]
pub struct CreateVariantInput {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    #[serde(default)]
    pub position: i32,
}

/// Product with its variants
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: ProductModel,
    pub variants: Vec<ProductVariantModel>,
}
