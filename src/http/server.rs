//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::{router, AppState};
use crate::config::ServerConfig;
use crate::error::{Result, TurnstileError};
use crate::ratelimit::RateLimiter;

/// HTTP server for the validation endpoint.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// State shared with the handlers
    state: AppState,
    /// Largest accepted request body
    max_body_bytes: usize,
}

impl HttpServer {
    /// Create a new HTTP server with default server settings.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>) -> Self {
        let defaults = ServerConfig::default();
        Self {
            addr,
            state: AppState::new(rate_limiter, defaults.retry_after_secs),
            max_body_bytes: defaults.max_body_bytes,
        }
    }

    /// Create a new HTTP server from the server configuration section.
    pub fn from_config(config: &ServerConfig, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            addr: config.listen_addr,
            state: AppState::new(rate_limiter, config.retry_after_secs),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state, self.max_body_bytes);

        info!(
            addr = %listener.local_addr()?,
            "Starting HTTP server for validation endpoint"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Server(e.to_string())
        })
    }
}
