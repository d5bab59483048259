mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use marketplace_api::entities::user;
use serde_json::json;

#[tokio::test]
async fn register_login_and_profile_round_trip() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/users/register",
            None,
            Some(json!({
                "email": "alice@example.com",
                "password": "s3cure-password",
                "name": "Alice"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], json!("alice@example.com"));
    // hashes never leave the service
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({
                "email": "alice@example.com",
                "password": "s3cure-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"].as_str().unwrap().to_string();
    assert!(body["data"]["refresh_token"].as_str().is_some());

    let (status, body) = app
        .request(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Alice"));
}

#[tokio::test]
async fn email_addresses_are_unique() {
    let app = TestApp::new().await;
    app.seed_user("taken@example.com", user::UserRole::User).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/users/register",
            None,
            Some(json!({
                "email": "taken@example.com",
                "password": "s3cure-password",
                "name": "Imposter"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_input_is_validated() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/users/register",
            None,
            Some(json!({
                "email": "not-an-email",
                "password": "short",
                "name": ""
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.seed_user("bob@example.com", user::UserRole::User).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({
                "email": "bob@example.com",
                "password": "not-the-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_email_gets_the_same_error_as_wrong_password() {
    let app = TestApp::new().await;
    app.seed_user("bob@example.com", user::UserRole::User).await;

    let (_, wrong_password) = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "email": "bob@example.com", "password": "nope-nope" })),
        )
        .await;
    let (status, unknown_email) = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "email": "ghost@example.com", "password": "nope-nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["message"], unknown_email["message"]);
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let app = TestApp::new().await;
    let user = app.seed_user("carol@example.com", user::UserRole::User).await;
    let token = app.token_for(&user);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&token),
            Some(json!({
                "current_password": "wrong-guess",
                "new_password": "brand-new-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&token),
            Some(json!({
                "current_password": "password123",
                "new_password": "brand-new-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // old credentials no longer work, new ones do
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "email": "carol@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({
                "email": "carol@example.com",
                "password": "brand-new-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/users/me", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::GET,
            "/api/v1/users/me",
            Some("not.a.token"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
