use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::{conversation, message};
use crate::errors::ApiError;
use crate::handlers::common::validate_input;
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ConversationListQuery {
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub body: String,
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ConversationListQuery>,
) -> Result<Json<ApiResponse<Vec<conversation::Model>>>, ApiError> {
    let threads = state
        .services
        .conversations
        .list_for_user(auth_user.user_id, query.product_id)
        .await?;
    Ok(Json(ApiResponse::success(threads)))
}

async fn start_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<conversation::Model>>), ApiError> {
    let thread = state
        .services
        .conversations
        .start_or_get(auth_user.user_id, payload.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(thread))))
}

async fn list_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<message::Model>>>, ApiError> {
    let messages = state
        .services
        .conversations
        .list_messages(conversation_id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(messages)))
}

async fn send_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<message::Model>>), ApiError> {
    validate_input(&payload)?;
    let message = state
        .services
        .conversations
        .send_message(conversation_id, auth_user.user_id, payload.body)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations))
        .route("/", post(start_conversation))
        .route("/:id/messages", get(list_messages))
        .route("/:id/messages", post(send_message))
        .with_auth(state.auth.clone())
}
