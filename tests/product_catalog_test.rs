mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use marketplace_api::entities::user;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn listing_only_shows_available_products() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    app.seed_product(&seller, "Lamp", dec!(10.00), Some(5)).await;
    let token = app.token_for(&seller);

    // archive a second product through the API
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({ "title": "Old Chair", "price": "25.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let chair_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{chair_id}"),
            Some(&token),
            Some(json!({ "status": "archived" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::GET, "/api/v1/products", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], json!(1));
    assert_eq!(page["items"][0]["title"], json!("Lamp"));

    // direct fetch still works for the archived listing
    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{chair_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn listing_filters_by_category_and_price() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let token = app.token_for(&seller);

    for (title, price, category) in [
        ("Lamp", "10.00", "lighting"),
        ("Floor Lamp", "80.00", "lighting"),
        ("Mug", "4.50", "kitchen"),
    ] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/products",
                Some(&token),
                Some(json!({ "title": title, "price": price, "category": category })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app
        .request(Method::GET, "/api/v1/products?category=lighting", None, None)
        .await;
    assert_eq!(body["data"]["total"], json!(2));

    let (_, body) = app
        .request(
            Method::GET,
            "/api/v1/products?category=lighting&max_price=50",
            None,
            None,
        )
        .await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["items"][0]["title"], json!("Lamp"));

    let (_, body) = app
        .request(Method::GET, "/api/v1/products?page=1&limit=2", None, None)
        .await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], json!(3));
    assert_eq!(body["data"]["total_pages"], json!(2));
}

#[tokio::test]
async fn negative_price_is_rejected() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&app.token_for(&seller)),
            Some(json!({ "title": "Lamp", "price": "-1.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_update_distinguishes_null_from_absent() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let token = app.token_for(&seller);

    let (_, body) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({
                "title": "Lamp",
                "description": "Bright desk lamp",
                "price": "10.00",
                "stock": 5
            })),
        )
        .await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    // absent description stays, price changes
    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{product_id}"),
            Some(&token),
            Some(json!({ "price": "12.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], json!("Bright desk lamp"));
    assert_eq!(body["data"]["price"], json!("12.00"));

    // explicit nulls clear description and stop tracking stock
    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{product_id}"),
            Some(&token),
            Some(json!({ "description": null, "stock": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], json!(null));
    assert_eq!(body["data"]["stock"], json!(null));
    assert_eq!(body["data"]["price"], json!("12.00"));
}

#[tokio::test]
async fn only_the_seller_or_an_admin_can_edit() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let other = app.seed_user("other@example.com", user::UserRole::User).await;
    let admin = app.seed_user("admin@example.com", user::UserRole::Admin).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(5)).await;

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", lamp.id),
            Some(&app.token_for(&other)),
            Some(json!({ "price": "1.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}", lamp.id),
            Some(&app.token_for(&admin)),
            Some(json!({ "price": "8.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], json!("8.00"));
}

#[tokio::test]
async fn deleted_products_disappear() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(5)).await;
    let token = app.token_for(&seller);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", lamp.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", lamp.id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creating_a_product_requires_authentication() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/products",
            None,
            Some(json!({ "title": "Lamp", "price": "10.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
