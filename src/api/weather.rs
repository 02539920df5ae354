//! Weather endpoint

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};

use super::ApiState;
use super::error::ApiError;
use crate::protocol::{ResultResponse, WeatherRequest};

/// Build weather router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/weather", post(weather))
        .with_state(state)
}

async fn weather(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<WeatherRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    let client = state
        .weather
        .as_ref()
        .ok_or(ApiError::NotConfigured("weather is not configured"))?;

    let city = request.city.trim();
    if city.is_empty() {
        return Err(ApiError::BadRequest("empty city".to_string()));
    }

    let result = client.current(city).await?;
    Ok(Json(ResultResponse { result }))
}
