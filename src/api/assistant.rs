//! Chat endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};

use super::ApiState;
use super::error::ApiError;
use crate::protocol::{ChatRequest, ResultResponse};

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/smart", post(smart))
        .route("/api/generate", post(generate))
        .with_state(state)
}

fn require_prompt(request: &ChatRequest) -> Result<(), ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("empty prompt".to_string()));
    }
    Ok(())
}

/// Personality-aware reply with conversation context
async fn smart(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    let chat = state
        .chat
        .as_ref()
        .ok_or(ApiError::NotConfigured("chat is not configured"))?;
    require_prompt(&request)?;

    let result = chat.complete(&request).await?;
    Ok(Json(ResultResponse { result }))
}

/// Plain completion of a prompt
async fn generate(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    let chat = state
        .chat
        .as_ref()
        .ok_or(ApiError::NotConfigured("chat is not configured"))?;
    require_prompt(&request)?;

    let result = chat.generate(&request.prompt).await?;
    Ok(Json(ResultResponse { result }))
}
