//! Error types for the Jam3a rate limiting service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for library and startup operations.
#[derive(Error, Debug)]
pub enum Jam3aError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the layered settings loader
    #[error("Settings error: {0}")]
    Settings(#[from] ::config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Jam3a operations.
pub type Result<T> = std::result::Result<T, Jam3aError>;

/// Message returned to clients that exceed their request quota.
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests, please try again later";

/// Errors surfaced to HTTP clients.
///
/// Rendered with the API's JSON envelope, `{"status": "fail", "message": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Too many requests, please try again later")]
    TooManyRequests,

    #[error("Route not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "status": "fail",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
