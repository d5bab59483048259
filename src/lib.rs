pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod rate_limiter;
pub mod services;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::handlers::AppServices;
use crate::rate_limiter::{InMemoryStore, RateLimiter, RedisStore};
use crate::services::payment_gateway::{PaymentGateway, StripeGateway};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub event_sender: EventSender,
    pub services: AppServices,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wires services against a connection, the configured payment gateway
    /// and a fresh event channel.
    pub async fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
    ) -> Result<Self, ServiceError> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(
            config.stripe_api_base.clone(),
            config.stripe_secret_key.clone(),
            Duration::from_secs(config.gateway_timeout_secs),
        )?);
        Self::with_gateway(db, config, gateway).await
    }

    /// Same wiring with an injected gateway; used by tests.
    pub async fn with_gateway(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, ServiceError> {
        let event_sender = events::spawn_event_processor(config.event_channel_capacity);
        let auth = AuthService::new(
            &config.jwt_secret,
            config.jwt_expiration,
            config.refresh_token_expiration,
        );

        let store: Arc<dyn rate_limiter::RateLimitStore> = if config.rate_limit_use_redis {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                ServiceError::InternalError(
                    "rate_limit_use_redis set without redis_url".to_string(),
                )
            })?;
            Arc::new(RedisStore::connect(url).await?)
        } else {
            Arc::new(InMemoryStore::new())
        };
        let rate_limiter = RateLimiter::new(
            store,
            u64::from(config.rate_limit_requests_per_window),
            Duration::from_secs(config.rate_limit_window_seconds),
        );

        let services = AppServices {
            users: services::users::UserService::new(db.clone(), auth.clone(), event_sender.clone()),
            products: services::products::ProductService::new(db.clone()),
            carts: services::carts::CartService::new(db.clone()),
            orders: services::orders::OrderService::new(db.clone(), event_sender.clone()),
            checkout: services::checkout::CheckoutService::new(
                db.clone(),
                gateway.clone(),
                event_sender.clone(),
                &config,
            ),
            payments: services::payments::PaymentService::new(db.clone()),
            webhooks: services::webhooks::WebhookService::new(
                db.clone(),
                gateway,
                event_sender.clone(),
                config.stripe_webhook_secret.clone(),
                config.stripe_webhook_tolerance_secs,
            ),
            reviews: services::reviews::ReviewService::new(db.clone()),
            wishlists: services::wishlists::WishlistService::new(db.clone()),
            conversations: services::conversations::ConversationService::new(db.clone()),
            reports: services::reports::ReportService::new(db.clone(), event_sender.clone()),
        };

        Ok(Self {
            db,
            config: Arc::new(config),
            auth,
            event_sender,
            services,
            rate_limiter,
        })
    }
}

/// Standard success envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        Self {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// All resource routers nested under `/api/v1`.
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", handlers::users::routes(state))
        .nest("/products", handlers::products::routes(state))
        .nest("/cart", handlers::carts::routes(state))
        .nest("/orders", handlers::orders::routes(state))
        .nest("/payments", handlers::payments::routes(state))
        .nest("/reviews", handlers::reviews::routes(state))
        .nest("/wishlist", handlers::wishlists::routes(state))
        .nest("/conversations", handlers::conversations::routes(state))
        .nest("/reports", handlers::reports::routes(state))
}

/// Builds the full application router with health endpoints and the
/// request logging / rate-limit middleware.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .nest("/api/v1", api_v1_routes(&state))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn api_status() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let db_status = match db::ping(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };
    Json(ApiResponse::success(json!({
        "status": db_status,
        "database": db_status,
    })))
}

/// Fixed-window rate limiting keyed by the forwarded client address.
async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let key = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string();
    state.rate_limiter.check(&key).await?;
    Ok(next.run(req).await)
}

async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}
