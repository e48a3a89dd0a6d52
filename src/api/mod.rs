//! Read-only HTTP API over the status cache and uptime history
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/hosts` - List monitored hosts with their last cached state
//! - `GET /api/v1/hosts/:name/status` - Cached probe outcome (`?refresh=true` probes now)
//! - `GET /api/v1/hosts/:name/uptime` - Hour-by-hour uptime window (`?hours=N`)

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, HostSummary, HostsResponse, StatusResponse, UptimeResponse};

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/hosts", get(routes::hosts::list_hosts))
        .route("/api/v1/hosts/:name/status", get(routes::hosts::host_status))
        .route("/api/v1/hosts/:name/uptime", get(routes::hosts::host_uptime))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(
    bind_addr: SocketAddr,
    state: ApiState,
) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
