use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::order;
use crate::errors::ApiError;
use crate::handlers::common::ListQuery;
use crate::services::orders::OrderWithItems;
use crate::{ApiResponse, AppState, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: order::OrderStatus,
}

async fn create_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<(StatusCode, Json<ApiResponse<OrderWithItems>>), ApiError> {
    let order = state
        .services
        .orders
        .create_from_cart(auth_user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

async fn list_my_orders(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<order::Model>>>, ApiError> {
    let orders = state
        .services
        .orders
        .list_my_orders(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderWithItems>>, ApiError> {
    let order = state
        .services
        .orders
        .get_order(order_id, auth_user.user_id, auth_user.is_admin())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn list_all_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<order::Model>>>, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_all_orders(query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders,
        total,
        query.page,
        query.limit,
    ))))
}

async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<order::Model>>, ApiError> {
    let updated = state
        .services
        .orders
        .update_order_status(order_id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let user = Router::new()
        .route("/", post(create_order))
        .route("/", get(list_my_orders))
        .route("/:id", get(get_order))
        .with_auth(state.auth.clone());
    let admin = Router::new()
        .route("/all", get(list_all_orders))
        .route("/:id/status", put(update_order_status))
        .with_role(state.auth.clone(), "admin");
    user.merge(admin)
}
