use crate::auth::{AuthRouterExt, AuthUser, TokenPair};
use crate::entities::user;
use crate::errors::ApiError;
use crate::handlers::common::validate_input;
use crate::{ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: user::Model,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<user::Model>>), ApiError> {
    validate_input(&payload)?;
    let created = state
        .services
        .users
        .register(payload.email, payload.password, payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    validate_input(&payload)?;
    let (user, tokens) = state
        .services
        .users
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(ApiResponse::success(LoginResponse { user, tokens })))
}

async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.services.users.logout(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate_input(&payload)?;
    state
        .services
        .users
        .change_password(
            auth_user.user_id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;
    Ok(Json(ApiResponse::success(())))
}

async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<user::Model>>, ApiError> {
    let profile = state.services.users.get_profile(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login));
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/me", get(me))
        .with_auth(state.auth.clone());
    public.merge(protected)
}
