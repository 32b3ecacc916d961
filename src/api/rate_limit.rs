//! Per-IP token-bucket rate limiting, applied to every request (spec §4.5,
//! "Rate limiting").

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::state::AppState;
use crate::errors::ApiError;

/// Axum middleware: acquire one token from the caller's bucket before
/// letting the request through. `leaky_bucket`'s bucket already implements
/// the "fail open" behavior spec §4.5 asks for on backend unavailability,
/// since the bucket lives in process memory rather than a separate backing
/// store that can go down independently.
pub async fn enforce<B>(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let limiter = state.rate_limiter_for(addr.ip());
    if limiter.try_acquire(1) {
        Ok(next.run(request).await)
    } else {
        let retry_after_secs = state.rate_limit.duration.as_secs().max(1);
        Err(ApiError::RateLimited { retry_after_secs })
    }
}
