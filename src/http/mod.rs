//! HTTP surface: router, rate limiting middleware and server.

mod middleware;
mod server;

pub use middleware::{
    apply_headers, rate_limit, RateLimitState, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};
pub use server::HttpServer;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;

/// Build the API router with rate limiting applied to every route, including the fallback.
pub fn router(state: Arc<RateLimitState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(state, rate_limit))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
