//! Host status and uptime endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{HostHealthStatus, HostSummary, HostsResponse, StatusResponse, UptimeResponse},
};
use crate::storage::{UptimeWindow, backend::unix_now};

/// Longest window the uptime endpoint renders
pub const MAX_WINDOW_HOURS: u32 = crate::config::MAX_HISTORY_HOURS;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Probe now instead of serving a cached outcome
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UptimeQuery {
    /// Window length in hours (default: 48)
    hours: Option<u32>,
}

/// GET /api/v1/hosts
///
/// List configured hosts with their last cached state
pub async fn list_hosts(State(state): State<ApiState>) -> Json<HostsResponse> {
    let mut hosts = Vec::with_capacity(state.hosts.len());

    for host in state.hosts.iter() {
        let entry = state.cache.peek(&host.name).await;
        hosts.push(HostSummary {
            name: host.name.clone(),
            address: host.address.clone(),
            status: HostHealthStatus::from(entry.as_ref().map(|entry| &entry.outcome)),
            age_secs: entry.map(|entry| entry.age().as_secs()),
        });
    }

    Json(HostsResponse {
        count: hosts.len(),
        hosts,
    })
}

/// GET /api/v1/hosts/:name/status?refresh=bool
pub async fn host_status(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let host = state
        .host(&name)
        .cloned()
        .ok_or_else(|| ApiError::unknown_host(&name))?;

    let outcome = state
        .cache
        .get(&name, state.max_age, query.refresh)
        .await
        .ok_or_else(|| ApiError::unknown_host(&name))?;
    let age_secs = state
        .cache
        .peek(&name)
        .await
        .map(|entry| entry.age().as_secs())
        .unwrap_or_default();

    Ok(Json(StatusResponse {
        host,
        outcome,
        age_secs,
    }))
}

/// GET /api/v1/hosts/:name/uptime?hours=N
pub async fn host_uptime(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<UptimeQuery>,
) -> ApiResult<Json<UptimeResponse>> {
    if state.host(&name).is_none() {
        return Err(ApiError::unknown_host(&name));
    }

    let hours = query.hours.unwrap_or(state.default_hours);
    if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
        return Err(ApiError::InvalidRequest(format!(
            "hours must be between 1 and {MAX_WINDOW_HOURS}"
        )));
    }

    let now = unix_now();
    let history = state.store.get_history_at(&name, hours, now).await?;
    let window = UptimeWindow::render(&history, hours, now);

    Ok(Json(UptimeResponse {
        host: name,
        hours,
        no_data: window.is_empty(),
        symbols: window.symbols().to_vec(),
        emoji: window.to_emoji(),
        uptime_percentage: window.uptime_percentage(),
        history,
    }))
}
