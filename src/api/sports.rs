//! Sports endpoint

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};

use super::ApiState;
use super::error::ApiError;
use crate::protocol::{SportsRequest, SportsResponse};
use crate::sports;

/// Build sports router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/sports", post(lookup))
        .with_state(state)
}

/// Game answering a stat request; `game` is null when none matched
async fn lookup(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SportsRequest>,
) -> Result<Json<SportsResponse>, ApiError> {
    let odds = state
        .odds
        .as_ref()
        .ok_or(ApiError::NotConfigured("sports is not configured"))?;

    let team = sports::team(&request.team)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown team: {}", request.team)))?;

    let game = odds.game(team, request.stat_type).await?;
    Ok(Json(SportsResponse { game }))
}
