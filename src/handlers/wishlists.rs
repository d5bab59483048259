use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::product;
use crate::errors::ApiError;
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddWishlistRequest {
    pub product_id: Uuid,
}

async fn list_wishlist(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ApiError> {
    let products = state.services.wishlists.list(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(products)))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<AddWishlistRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    state
        .services
        .wishlists
        .add(auth_user.user_id, payload.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(()))))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .services
        .wishlists
        .remove(auth_user.user_id, product_id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_wishlist))
        .route("/", post(add_to_wishlist))
        .route("/:product_id", delete(remove_from_wishlist))
        .with_auth(state.auth.clone())
}
