use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use marketplace_api::{
    auth,
    config::AppConfig,
    db,
    entities::{product, user},
    errors::ServiceError,
    services::payment_gateway::{
        CheckoutSession, CreateSessionParams, PaymentGateway, PaymentIntent,
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use sha2::Sha256;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

mockall::mock! {
    pub Gateway {}

    #[async_trait::async_trait]
    impl PaymentGateway for Gateway {
        async fn create_checkout_session(
            &self,
            params: CreateSessionParams,
        ) -> Result<CheckoutSession, ServiceError>;

        async fn retrieve_payment_intent(
            &self,
            intent_id: &str,
        ) -> Result<PaymentIntent, ServiceError>;
    }
}

/// Spins up the full application over a fresh SQLite database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _db_dir: TempDir,
}

impl TestApp {
    /// App with a gateway that panics if called; fine for tests that never
    /// reach the payment processor.
    #[allow(dead_code)]
    pub async fn new() -> Self {
        Self::with_gateway(Arc::new(MockGateway::new())).await
    }

    pub async fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("test.db");
        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only".to_string(),
            "sk_test_key".to_string(),
            TEST_WEBHOOK_SECRET.to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.rate_limit_requests_per_window = 100_000;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("create test database");
        db::run_migrations(&pool).await.expect("run migrations");

        let state = AppState::with_gateway(Arc::new(pool), cfg, gateway)
            .await
            .expect("build app state");
        let router = marketplace_api::build_app(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
        }
    }

    /// Inserts a user directly; passwords all hash "password123".
    pub async fn seed_user(&self, email: &str, role: user::UserRole) -> user::Model {
        let now = Utc::now();
        let row = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(auth::hash_password("password123").expect("hash password")),
            name: Set(email.split('@').next().unwrap_or("user").to_string()),
            role: Set(role),
            refresh_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(&*self.state.db).await.expect("insert user")
    }

    pub async fn seed_product(
        &self,
        seller: &user::Model,
        title: &str,
        price: Decimal,
        stock: Option<i32>,
    ) -> product::Model {
        let now = Utc::now();
        let row = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller.id),
            title: Set(title.to_string()),
            description: Set(None),
            price: Set(price),
            stock: Set(stock),
            status: Set(product::ProductStatus::Available),
            category: Set(None),
            image_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(&*self.state.db).await.expect("insert product")
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.state
            .auth
            .generate_tokens(user)
            .expect("generate tokens")
            .access_token
    }

    /// Sends a request through the router and decodes the JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse json body")
        };
        (status, value)
    }

    /// Delivers a signed webhook payload to the receiver endpoint.
    pub async fn deliver_webhook(&self, payload: &Value) -> (StatusCode, Value) {
        let body = payload.to_string();
        let header_value = sign_webhook(TEST_WEBHOOK_SECRET, Utc::now().timestamp(), body.as_bytes());
        self.deliver_webhook_raw(&body, &header_value).await
    }

    pub async fn deliver_webhook_raw(
        &self,
        body: &str,
        signature_header: &str,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .header("Stripe-Signature", signature_header)
            .body(Body::from(body.to_string()))
            .expect("build webhook request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send webhook");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse json body")
        };
        (status, value)
    }
}

/// Builds a `Stripe-Signature` header value for a payload.
pub fn sign_webhook(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}
