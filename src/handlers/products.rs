use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::product;
use crate::errors::ApiError;
use crate::handlers::common::{default_limit, default_page, validate_input};
use crate::services::products::{NewProduct, ProductFilter, ProductUpdate};
use crate::{ApiResponse, AppState, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// Absent fields stay unchanged; explicit nulls clear nullable columns.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::handlers::common::double_option")]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::handlers::common::double_option")]
    pub stock: Option<Option<i32>>,
    pub status: Option<product::ProductStatus>,
    #[serde(default, deserialize_with = "crate::handlers::common::double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::handlers::common::double_option")]
    pub image_url: Option<Option<String>>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<product::Model>>>, ApiError> {
    let (items, total) = state
        .services
        .products
        .list(ProductFilter {
            category: query.category,
            min_price: query.min_price,
            max_price: query.max_price,
            seller_id: query.seller_id,
            page: query.page,
            per_page: query.limit,
        })
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ApiError> {
    let product = state.services.products.get(product_id).await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ApiError> {
    validate_input(&payload)?;
    let created = state
        .services
        .products
        .create(
            auth_user.user_id,
            NewProduct {
                title: payload.title,
                description: payload.description,
                price: payload.price,
                stock: payload.stock,
                category: payload.category,
                image_url: payload.image_url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<product::Model>>, ApiError> {
    let updated = state
        .services
        .products
        .update(
            product_id,
            auth_user.user_id,
            auth_user.is_admin(),
            ProductUpdate {
                title: payload.title,
                description: payload.description,
                price: payload.price,
                stock: payload.stock,
                status: payload.status,
                category: payload.category,
                image_url: payload.image_url,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn delete_product(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .services
        .products
        .delete(product_id, auth_user.user_id, auth_user.is_admin())
        .await?;
    Ok(Json(ApiResponse::success(())))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product));
    let protected = Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .with_auth(state.auth.clone());
    public.merge(protected)
}
