//! Health check endpoint

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Returns a simple health check response
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let storage_healthy = state
        .store
        .health_check()
        .await
        .map(|health| health.healthy)
        .unwrap_or(false);

    let storage_stats = match state.store.get_stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("failed to collect storage stats: {e}");
            None
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage_healthy,
        storage_stats,
    })
}
