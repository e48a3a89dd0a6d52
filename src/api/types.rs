//! API response types

use serde::{Deserialize, Serialize};

use crate::storage::{HistoryPoint, UptimeSymbol};
use crate::{HostIdentity, ProbeOutcome};

/// Health status for hosts, as last seen by the cache
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostHealthStatus {
    Online,
    Offline,
    /// Not probed since startup
    Unknown,
}

impl HostHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostHealthStatus::Online => "online",
            HostHealthStatus::Offline => "offline",
            HostHealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HostHealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<&ProbeOutcome>> for HostHealthStatus {
    fn from(outcome: Option<&ProbeOutcome>) -> Self {
        match outcome {
            Some(ProbeOutcome::Online(_)) => HostHealthStatus::Online,
            Some(ProbeOutcome::Offline { .. }) => HostHealthStatus::Offline,
            None => HostHealthStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage_healthy: bool,
    /// Record counts and history span of the uptime store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_stats: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
    pub name: String,
    pub address: String,
    pub status: HostHealthStatus,
    /// Seconds since the cached outcome was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsResponse {
    pub hosts: Vec<HostSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub host: HostIdentity,
    pub outcome: ProbeOutcome,
    pub age_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeResponse {
    pub host: String,
    pub hours: u32,
    pub no_data: bool,
    pub symbols: Vec<UptimeSymbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Share of known hours that were up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_percentage: Option<f64>,
    pub history: Vec<HistoryPoint>,
}
