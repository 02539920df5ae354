//! Relay request throttling
//!
//! One shared quota across every `/api/*` route. `/health` and `/ready` are
//! never throttled. Rejections use the same error envelope as
//! every other relay failure and carry a `Retry-After` hint.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use super::{ApiError, ApiState};

/// Quota shared by all relay clients
pub type RelayLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Allow `requests_per_minute` calls, all of which may arrive at once
pub fn relay_limiter(requests_per_minute: u32) -> RelayLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Whole seconds until the limiter admits another call, at least one
fn retry_after(limiter: &RelayLimiter) -> Option<u64> {
    let not_until = limiter.check().err()?;
    let wait = not_until.wait_time_from(DefaultClock::default().now());
    Some(wait.as_secs().max(1))
}

/// Reject `/api/*` calls over quota with `429 rate_limited`
pub async fn throttle(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(retry_after_secs) = state.rate_limiter.as_ref().and_then(retry_after) {
        tracing::warn!(path = %req.uri().path(), retry_after_secs, "relay quota exhausted");
        return Err(ApiError::RateLimited { retry_after_secs });
    }
    Ok(next.run(req).await)
}
