//! Schedule endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};

use super::ApiState;
use super::error::ApiError;
use crate::protocol::{ScheduleDeleteRequest, ScheduleRequest, ScheduleResponse};

/// Build schedule router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/schedule", post(command))
        .route("/api/schedule/delete", post(delete))
        .with_state(state)
}

/// Run a spoken scheduling command
async fn command(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("empty prompt".to_string()));
    }

    let schedule = state.schedule.clone();
    let response = tokio::task::spawn_blocking(move || schedule.execute(&request.prompt))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(response))
}

/// Delete an item chosen from a disambiguation prompt
async fn delete(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ScheduleDeleteRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    if request.id.trim().is_empty() {
        return Err(ApiError::BadRequest("empty id".to_string()));
    }

    let schedule = state.schedule.clone();
    let response = tokio::task::spawn_blocking(move || schedule.delete_by_id(&request.id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(response))
}
