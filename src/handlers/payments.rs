use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::{payment, refund};
use crate::errors::{ApiError, ServiceError};
use crate::services::payment_gateway::CheckoutSession;
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
}

async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CheckoutSessionRequest>,
) -> Result<Json<ApiResponse<CheckoutSession>>, ApiError> {
    let session = state
        .services
        .checkout
        .create_session(payload.order_id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(session)))
}

/// Webhook receiver. Signature verification runs over the raw body before
/// anything is parsed; failures return 400 with no state change, and
/// processing errors surface as 5xx so the processor redelivers.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::InvalidSignature("missing Stripe-Signature header".to_string())
        })?;

    state.services.webhooks.handle(&body, signature).await?;
    Ok(Json(json!({ "received": true })))
}

async fn list_order_payments(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<payment::Model>>>, ApiError> {
    // Ownership check rides on the order lookup
    state
        .services
        .orders
        .get_order(order_id, auth_user.user_id, auth_user.is_admin())
        .await?;
    let payments = state.services.payments.list_for_order(order_id).await?;
    Ok(Json(ApiResponse::success(payments)))
}

async fn list_payment_refunds(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<refund::Model>>>, ApiError> {
    let payment = state.services.payments.get_payment(payment_id).await?;
    state
        .services
        .orders
        .get_order(payment.order_id, auth_user.user_id, auth_user.is_admin())
        .await?;
    let refunds = state.services.payments.list_refunds(payment_id).await?;
    Ok(Json(ApiResponse::success(refunds)))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/webhook", post(webhook));
    let protected = Router::new()
        .route("/checkout-session", post(create_checkout_session))
        .route("/orders/:order_id", get(list_order_payments))
        .route("/:payment_id/refunds", get(list_payment_refunds))
        .with_auth(state.auth.clone());
    public.merge(protected)
}
