//! Route handlers.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::{instrument, trace, warn};

use super::response::{ApiError, ValidateResponse};
use super::AppState;

/// Identifier used when neither a user id nor a peer address is available.
const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Peer socket address, when the server was started with connect info.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(PeerAddr(addr))
    }
}

/// Body accepted by `POST /validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    /// Caller-supplied identifier
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,

    /// Payload echoed back on success
    #[serde(default)]
    pub input: Value,
}

impl ValidateRequest {
    /// Parse a raw body, separating non-JSON from JSON of the wrong shape.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;

        // Derived struct visitors also accept sequences; only objects are requests.
        if !value.is_object() {
            return Err(ApiError::InvalidRequest);
        }
        serde_json::from_value(value).map_err(|_| ApiError::InvalidRequest)
    }

    /// Rate limit key: the user id when present and non-empty, else the peer IP.
    pub fn identifier(&self, peer: Option<SocketAddr>) -> String {
        match (self.user_id.as_deref(), peer) {
            (Some(id), _) if !id.is_empty() => id.to_string(),
            (_, Some(addr)) => addr.ip().to_string(),
            _ => UNKNOWN_IDENTIFIER.to_string(),
        }
    }
}

/// Liveness probe.
pub async fn root_handler() -> Json<Value> {
    Json(json!({ "status": "running" }))
}

/// Admit or reject one request based on its identifier's recent history.
#[instrument(skip_all, fields(peer = ?peer.0))]
pub async fn validate_handler(
    State(state): State<AppState>,
    peer: PeerAddr,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = ValidateRequest::parse(&body)?;
    let identifier = request.identifier(peer.0);

    let verdict = state.rate_limiter.check(&identifier);

    if !verdict.admitted {
        let reason = verdict.reason.describe(state.rate_limiter.limits());
        warn!(
            identifier = %identifier,
            reason = %verdict.reason,
            "Rate limit triggered for {}: {}",
            identifier,
            reason
        );
        return Ok(ValidateResponse::blocked(reason).rate_limited(state.retry_after_secs));
    }

    trace!(identifier = %identifier, "Request admitted");
    Ok(Json(ValidateResponse::passed(request.input)).into_response())
}
