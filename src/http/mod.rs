//! HTTP boundary: request parsing, identifier resolution and verdict rendering.

mod handlers;
mod response;
mod server;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::ratelimit::RateLimiter;

pub use handlers::{root_handler, validate_handler, PeerAddr, ValidateRequest};
pub use response::{ApiError, ValidateResponse};
pub use server::HttpServer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: Arc<RateLimiter>,
    /// Seconds advertised in `Retry-After` on rejection
    pub retry_after_secs: u64,
}

impl AppState {
    pub fn new(rate_limiter: Arc<RateLimiter>, retry_after_secs: u64) -> Self {
        Self {
            rate_limiter,
            retry_after_secs,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/validate", post(validate_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
