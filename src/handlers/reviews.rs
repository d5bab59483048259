use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::review;
use crate::errors::ApiError;
use crate::handlers::common::validate_input;
use crate::services::reviews::ReviewFilter;
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub product_id: Option<Uuid>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    #[serde(default, deserialize_with = "crate::handlers::common::double_option")]
    pub comment: Option<Option<String>>,
}

async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<ApiResponse<Vec<review::Model>>>, ApiError> {
    let reviews = state
        .services
        .reviews
        .list(ReviewFilter {
            product_id: query.product_id,
            min_rating: query.min_rating,
            max_rating: query.max_rating,
        })
        .await?;
    Ok(Json(ApiResponse::success(reviews)))
}

async fn create_review(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<review::Model>>), ApiError> {
    validate_input(&payload)?;
    let review = state
        .services
        .reviews
        .add(
            payload.product_id,
            auth_user.user_id,
            payload.rating,
            payload.comment,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(review))))
}

async fn update_review(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(review_id): Path<Uuid>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<Json<ApiResponse<review::Model>>, ApiError> {
    let review = state
        .services
        .reviews
        .update(review_id, auth_user.user_id, payload.rating, payload.comment)
        .await?;
    Ok(Json(ApiResponse::success(review)))
}

async fn delete_review(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(review_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .services
        .reviews
        .delete(review_id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/", get(list_reviews));
    let protected = Router::new()
        .route("/", post(create_review))
        .route("/:id", put(update_review))
        .route("/:id", delete(delete_review))
        .with_auth(state.auth.clone());
    public.merge(protected)
}
