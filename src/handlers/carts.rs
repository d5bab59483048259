use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::cart_item;
use crate::errors::ApiError;
use crate::handlers::common::validate_input;
use crate::services::carts::CartView;
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
}

async fn get_cart(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let cart = state
        .services
        .carts
        .list_with_total(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn add_item(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<cart_item::Model>>), ApiError> {
    validate_input(&payload)?;
    let line = state
        .services
        .carts
        .add_item(auth_user.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(line))))
}

async fn update_quantity(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<ApiResponse<cart_item::Model>>, ApiError> {
    validate_input(&payload)?;
    let line = state
        .services
        .carts
        .update_quantity(auth_user.user_id, product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(line)))
}

async fn remove_item(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .services
        .carts
        .remove_item(auth_user.user_id, product_id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_quantity))
        .route("/items/:product_id", delete(remove_item))
        .with_auth(state.auth.clone())
}
