mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    errors::ServiceError,
    services::{CreateProductInput, CreateVariantInput},
};
use uuid::Uuid;

#[tokio::test]
async fn created_product_is_retrievable_with_variants() {
    let app = TestApp::new().await;

    let product = app
        .services
        .catalog
        .create_product(CreateProductInput {
            name: "Mug".to_string(),
            slug: "mug".to_string(),
            sku: "MUG-001".to_string(),
            description: Some("Ceramic mug".to_string()),
            price: dec!(12.50),
            stock: 40,
            category_id: None,
            is_active: true,
        })
        .await
        .unwrap();

    let large = app
        .services
        .catalog
        .create_variant(CreateVariantInput {
            product_id: product.id,
            sku: "MUG-001-L".to_string(),
            name: "Mug Large".to_string(),
            price: dec!(15.00),
            stock: 10,
            position: 1,
        })
        .await
        .unwrap();
    let small = app
        .services
        .catalog
        .create_variant(CreateVariantInput {
            product_id: product.id,
            sku: "MUG-001-S".to_string(),
            name: "Mug Small".to_string(),
            price: dec!(11.00),
            stock: 10,
            position: 0,
        })
        .await
        .unwrap();

    let detail = app.services.catalog.get_product(product.id).await.unwrap();
    assert_eq!(detail.product.sku, "MUG-001");
    // Variants come back by position.
    assert_eq!(detail.variants.len(), 2);
    assert_eq!(detail.variants[0].id, small.id);
    assert_eq!(detail.variants[1].id, large.id);
}

#[tokio::test]
async fn variant_requires_an_existing_product() {
    let app = TestApp::new().await;

    let err = app
        .services
        .catalog
        .create_variant(CreateVariantInput {
            product_id: Uuid::new_v4(),
            sku: "GHOST-1".to_string(),
            name: "Ghost".to_string(),
            price: dec!(1.00),
            stock: 1,
            position: 0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn listing_hides_inactive_products_by_default() {
    let app = TestApp::new().await;
    let active = app.seed_product("Visible", dec!(10.00), 5).await;
    let hidden = app.seed_product("Hidden", dec!(10.00), 5).await;
    app.deactivate_product(&hidden).await;

    let (products, total) = app.services.catalog.list_products(1, 20, true).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(products[0].id, active.id);

    let (_, total_with_inactive) = app
        .services
        .catalog
        .list_products(1, 20, false)
        .await
        .unwrap();
    assert_eq!(total_with_inactive, 2);
}

#[tokio::test]
async fn unknown_product_is_a_not_found() {
    let app = TestApp::new().await;
    let err = app
        .services
        .catalog
        .get_product(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
