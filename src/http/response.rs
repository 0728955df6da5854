//! Response bodies for the validation endpoint.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Confidence reported when a request passes.
const PASS_CONFIDENCE: f64 = 0.95;
/// Confidence reported when a request is blocked.
const BLOCK_CONFIDENCE: f64 = 0.99;

/// Reason reported when a request passes.
pub const PASS_REASON: &str = "Input passed all security checks";

/// Body returned by `POST /validate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub blocked: bool,
    pub reason: String,
    /// The caller's input echoed back on success, `null` otherwise
    pub sanitized_output: Value,
    pub confidence: f64,
}

impl ValidateResponse {
    pub fn passed(input: Value) -> Self {
        Self {
            blocked: false,
            reason: PASS_REASON.to_string(),
            sanitized_output: input,
            confidence: PASS_CONFIDENCE,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: reason.into(),
            sanitized_output: Value::Null,
            confidence: BLOCK_CONFIDENCE,
        }
    }

    /// Render as a 429 carrying a `Retry-After` hint.
    pub fn rate_limited(self, retry_after_secs: u64) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            Json(self),
        )
            .into_response()
    }
}

/// Request bodies rejected before reaching the rate limiter.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// Body is not JSON
    #[error("Invalid JSON format")]
    InvalidJson,

    /// Body is JSON but not a valid validation request
    #[error("Invalid request")]
    InvalidRequest,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(error = %self, "Rejecting malformed request");
        (
            StatusCode::BAD_REQUEST,
            Json(ValidateResponse::blocked(self.to_string())),
        )
            .into_response()
    }
}
