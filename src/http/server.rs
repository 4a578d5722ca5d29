//! HTTP server implementation.

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::handlers::{health_handler, not_found_handler, stats_handler};
use super::middleware::{throttle_middleware, ThrottleState};
use crate::error::{Result, ThrottleError};
use crate::throttle::Throttle;

/// HTTP server exposing the throttled routes.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Middleware state wrapping the shared throttle
    state: ThrottleState,
}

impl HttpServer {
    /// Create a new HTTP server around a shared throttle.
    pub fn new(addr: SocketAddr, throttle: Arc<Throttle>) -> Self {
        Self {
            addr,
            state: ThrottleState::new(throttle),
        }
    }

    /// Build the application router.
    ///
    /// The throttle wraps every route and the fallback, so unmatched paths
    /// are counted and carry the quota headers. `/health` is mounted after
    /// the layer so it is not throttled.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/throttle/stats", get(stats_handler))
            .fallback(not_found_handler)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                throttle_middleware,
            ))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        let app = self.router();

        info!(addr = %local_addr, "Starting HTTP server with graceful shutdown");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            ThrottleError::Server(e.to_string())
        })
    }
}
