mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use marketplace_api::entities::{order, product, user, CartItem, Order, Product};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;
use uuid::Uuid;

async fn fill_cart(app: &TestApp, token: &str, product_id: Uuid, quantity: i32) {
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(token),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn order_freezes_totals_and_clears_cart() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(15.50), Some(10)).await;
    let mug = app.seed_product(&seller, "Mug", dec!(4.50), None).await;
    let token = app.token_for(&buyer);

    fill_cart(&app, &token, lamp.id, 2).await;
    fill_cart(&app, &token, mug.id, 1).await;

    let (status, body) = app
        .request(Method::POST, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    assert_eq!(data["total_amount"], json!("35.50"));
    assert_eq!(data["status"], json!("pending"));
    assert_eq!(data["payment_status"], json!("pending"));
    let items = data["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let lamp_item = items
        .iter()
        .find(|i| i["product_name"] == json!("Lamp"))
        .unwrap();
    assert_eq!(lamp_item["price_at_purchase"], json!("15.50"));
    assert_eq!(lamp_item["quantity"], json!(2));

    // cart emptied in the same transaction
    let remaining = CartItem::find()
        .filter(marketplace_api::entities::cart_item::Column::UserId.eq(buyer.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    // tracked stock decremented; untracked untouched
    let lamp_after = Product::find_by_id(lamp.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lamp_after.stock, Some(8));
    let mug_after = Product::find_by_id(mug.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mug_after.stock, None);
}

#[tokio::test]
async fn later_price_changes_do_not_touch_snapshots() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(20.00), Some(5)).await;
    let token = app.token_for(&buyer);

    fill_cart(&app, &token, lamp.id, 1).await;
    let (_, body) = app
        .request(Method::POST, "/api/v1/orders", Some(&token), None)
        .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let mut active: product::ActiveModel = lamp.into();
    active.price = Set(dec!(99.99));
    active.update(&*app.state.db).await.unwrap();

    let (_, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(body["data"]["total_amount"], json!("20.00"));
    assert_eq!(
        body["data"]["items"][0]["price_at_purchase"],
        json!("20.00")
    );
}

#[tokio::test]
async fn empty_cart_cannot_become_an_order() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let token = app.token_for(&buyer);

    let (status, _) = app
        .request(Method::POST, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn last_unit_goes_to_exactly_one_buyer() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let first = app.seed_user("first@example.com", user::UserRole::User).await;
    let second = app.seed_user("second@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(1)).await;
    let first_token = app.token_for(&first);
    let second_token = app.token_for(&second);

    // Both buyers hold the last unit in their carts.
    fill_cart(&app, &first_token, lamp.id, 1).await;
    fill_cart(&app, &second_token, lamp.id, 1).await;

    let (status, _) = app
        .request(Method::POST, "/api/v1/orders", Some(&first_token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // The guarded decrement finds no remaining stock for the second order.
    let (status, _) = app
        .request(Method::POST, "/api/v1/orders", Some(&second_token), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let lamp_after = Product::find_by_id(lamp.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lamp_after.stock, Some(0));
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_reservation_rolls_back_everything() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(5)).await;
    let mug = app.seed_product(&seller, "Mug", dec!(4.00), Some(2)).await;
    let token = app.token_for(&buyer);

    fill_cart(&app, &token, lamp.id, 2).await;
    fill_cart(&app, &token, mug.id, 2).await;

    // Deplete the mug stock behind the cart's back.
    let mut active: product::ActiveModel = mug.clone().into();
    active.stock = Set(Some(1));
    active.update(&*app.state.db).await.unwrap();

    let (status, _) = app
        .request(Method::POST, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // No order, no partial decrement, cart intact.
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    let lamp_after = Product::find_by_id(lamp.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lamp_after.stock, Some(5));
    let remaining = CartItem::find().count(&*app.state.db).await.unwrap();
    assert_eq!(remaining, 2);
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let other = app.seed_user("other@example.com", user::UserRole::User).await;
    let admin = app.seed_user("admin@example.com", user::UserRole::Admin).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(5)).await;
    let token = app.token_for(&buyer);

    fill_cart(&app, &token, lamp.id, 1).await;
    let (_, body) = app
        .request(Method::POST, "/api/v1/orders", Some(&token), None)
        .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.token_for(&other)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.token_for(&admin)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_endpoints_reject_regular_users() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let admin = app.seed_user("admin@example.com", user::UserRole::Admin).await;

    let (status, _) = app
        .request(
            Method::GET,
            "/api/v1/orders/all",
            Some(&app.token_for(&buyer)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::GET,
            "/api/v1/orders/all",
            Some(&app.token_for(&admin)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_can_override_order_status() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", user::UserRole::User).await;
    let buyer = app.seed_user("buyer@example.com", user::UserRole::User).await;
    let admin = app.seed_user("admin@example.com", user::UserRole::Admin).await;
    let lamp = app.seed_product(&seller, "Lamp", dec!(10.00), Some(5)).await;
    let token = app.token_for(&buyer);

    fill_cart(&app, &token, lamp.id, 1).await;
    let (_, body) = app
        .request(Method::POST, "/api/v1/orders", Some(&token), None)
        .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.token_for(&admin)),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("cancelled"));

    let stored = Order::find_by_id(Uuid::parse_str(&order_id).unwrap())
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, order::OrderStatus::Cancelled);
}
