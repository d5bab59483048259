mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use marketplace_api::entities::{product, user};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;

#[tokio::test]
async fn add_list_update_remove_round_trip() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(15.50), Some(10)).await;
    let mug = app.seed_product(&seller, "Mug", dec!(4.50), None).await;
    let token = app.token_for(&buyer);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": lamp.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": mug.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // 2 × 15.50 + 1 × 4.50
    let (status, body) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let cart = &body["data"];
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total"], json!("35.50"));

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", lamp.id),
            Some(&token),
            Some(json!({ "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", mug.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["total"], json!("15.50"));
}

#[tokio::test]
async fn adding_same_product_merges_quantities() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(10)).await;
    let token = app.token_for(&buyer);

    for _ in 0..2 {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/cart/items",
                Some(&token),
                Some(json!({ "product_id": lamp.id, "quantity": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], json!(4));
}

#[tokio::test]
async fn merged_quantity_cannot_exceed_stock() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(3)).await;
    let token = app.token_for(&buyer);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": lamp.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": lamp.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn cannot_add_own_product() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(3)).await;
    let token = app.token_for(&seller);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": lamp.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unavailable_product_rejected() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(3)).await;
    let token = app.token_for(&buyer);

    let mut active: product::ActiveModel = lamp.clone().into();
    active.status = Set(product::ProductStatus::Unavailable);
    active.update(&*app.state.db).await.unwrap();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": lamp.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_quantity_rejected() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(3)).await;
    let token = app.token_for(&buyer);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&token),
            Some(json!({ "product_id": lamp.id, "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn removing_missing_line_is_not_found() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let token = app.token_for(&buyer);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_requires_authentication() {
    let app = TestApp::new().await;
    let (status, _) = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
