use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::report;
use crate::errors::ApiError;
use crate::handlers::common::validate_input;
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

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub resolved: Option<bool>,
}

async fn create_report(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<report::Model>>), ApiError> {
    validate_input(&payload)?;
    let report = state
        .services
        .reports
        .create(payload.product_id, auth_user.user_id, payload.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(report))))
}

async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<ApiResponse<Vec<report::Model>>>, ApiError> {
    let reports = state.services.reports.list(query.resolved).await?;
    Ok(Json(ApiResponse::success(reports)))
}

async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ApiResponse<report::Model>>, ApiError> {
    let report = state.services.reports.get(report_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn resolve_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ApiResponse<report::Model>>, ApiError> {
    let report = state.services.reports.resolve(report_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.services.reports.delete(report_id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let user = Router::new()
        .route("/", post(create_report))
        .with_auth(state.auth.clone());
    let admin = Router::new()
        .route("/", get(list_reports))
        .route("/:id", get(get_report))
        .route("/:id/resolve", put(resolve_report))
        .route("/:id", delete(delete_report))
        .with_role(state.auth.clone(), "admin");
    user.merge(admin)
}
