mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = TestApp::new().await;
    let router = app.router();

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn product_listing_is_public() {
    let app = TestApp::new().await;
    app.seed_product("Widget", dec!(25.00), 10).await;
    let router = app.router();

    let response = router
        .oneshot(
            Request::get("/api/v1/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["name"], "Widget");
}

#[tokio::test]
async fn cart_requires_identity_header() {
    let app = TestApp::new().await;
    let router = app.router();

    let response = router
        .clone()
        .oneshot(Request::get("/api/v1/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(
            Request::get("/api/v1/cart")
                .header("x-user-id", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cart_flow_over_http() {
    let app = TestApp::new().await;
    let product = app.seed_product("Widget", dec!(25.00), 10).await;
    let router = app.router();
    let user_id = Uuid::new_v4();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/cart/items")
                .header("x-user-id", user_id.to_string())
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "product_id": product.id, "quantity": 2 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["subtotal"], "50.00");
    assert_eq!(body["data"]["total_items"], 2);

    // Zero quantity trips request validation before any service runs.
    let response = router
        .oneshot(
            Request::post("/api/v1/cart/items")
                .header("x-user-id", user_id.to_string())
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "product_id": product.id, "quantity": 0 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsigned_webhook_is_unauthorized() {
    let app = TestApp::new().await;
    let router = app.router();

    let response = router
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "type": "payment_intent.succeeded", "data": { "object": { "id": "pi_x" } } })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_product_is_404_over_http() {
    let app = TestApp::new().await;
    let router = app.router();

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/products/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
}
