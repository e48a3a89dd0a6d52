pub mod anchors;
#[cfg(feature = "api")]
pub mod api;
pub mod cache;
pub mod config;
pub mod discord;
pub mod monitors;
pub mod presenter;
pub mod render;
pub mod scheduler;
pub mod storage;
pub mod util;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a monitored host. `name` is the unique key across the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostIdentity {
    pub name: String,
    pub address: String,
}

impl HostIdentity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// The metric fields every snapshot carries, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    CpuModel,
    CpuUsage,
    RamTotal,
    RamUsed,
    DiskTotal,
    DiskUsage,
    ProcessCount,
    LoadAverage,
}

impl MetricField {
    pub const ALL: [MetricField; 8] = [
        MetricField::CpuModel,
        MetricField::CpuUsage,
        MetricField::RamTotal,
        MetricField::RamUsed,
        MetricField::DiskTotal,
        MetricField::DiskUsage,
        MetricField::ProcessCount,
        MetricField::LoadAverage,
    ];

    /// Text shown in place of a value the producer could not answer.
    pub fn fallback(&self) -> &'static str {
        match self {
            MetricField::CpuModel => "Unknown",
            _ => "N/A",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricField::CpuModel => "cpu_model",
            MetricField::CpuUsage => "cpu_usage",
            MetricField::RamTotal => "ram_total",
            MetricField::RamUsed => "ram_used",
            MetricField::DiskTotal => "disk_total",
            MetricField::DiskUsage => "disk_usage",
            MetricField::ProcessCount => "process_count",
            MetricField::LoadAverage => "load_average",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single display-ready metric, or the sentinel for "producer could not answer".
///
/// `Unavailable` is deliberately distinct from `Available(String::new())`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum MetricValue {
    Available(String),
    #[default]
    Unavailable,
}

impl MetricValue {
    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Available(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            MetricValue::Available(value) => Some(value),
            MetricValue::Unavailable => None,
        }
    }
}

impl<E> From<Result<String, E>> for MetricValue {
    fn from(value: Result<String, E>) -> Self {
        value.map_or(MetricValue::Unavailable, MetricValue::Available)
    }
}

/// Point-in-time metrics of one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Host label (the configured name)
    pub hostname: String,
    pub address: String,
    pub cpu_model: MetricValue,
    pub cpu_usage: MetricValue,
    pub ram_total: MetricValue,
    pub ram_used: MetricValue,
    pub disk_total: MetricValue,
    pub disk_usage: MetricValue,
    pub process_count: MetricValue,
    /// 1-minute load average
    pub load_average: MetricValue,
    pub captured_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// A snapshot with every metric field unavailable.
    pub fn empty(identity: &HostIdentity) -> Self {
        Self {
            hostname: identity.name.clone(),
            address: identity.address.clone(),
            cpu_model: MetricValue::Unavailable,
            cpu_usage: MetricValue::Unavailable,
            ram_total: MetricValue::Unavailable,
            ram_used: MetricValue::Unavailable,
            disk_total: MetricValue::Unavailable,
            disk_usage: MetricValue::Unavailable,
            process_count: MetricValue::Unavailable,
            load_average: MetricValue::Unavailable,
            captured_at: Utc::now(),
        }
    }

    pub fn get(&self, field: MetricField) -> &MetricValue {
        match field {
            MetricField::CpuModel => &self.cpu_model,
            MetricField::CpuUsage => &self.cpu_usage,
            MetricField::RamTotal => &self.ram_total,
            MetricField::RamUsed => &self.ram_used,
            MetricField::DiskTotal => &self.disk_total,
            MetricField::DiskUsage => &self.disk_usage,
            MetricField::ProcessCount => &self.process_count,
            MetricField::LoadAverage => &self.load_average,
        }
    }

    pub fn set(&mut self, field: MetricField, value: MetricValue) {
        let slot = match field {
            MetricField::CpuModel => &mut self.cpu_model,
            MetricField::CpuUsage => &mut self.cpu_usage,
            MetricField::RamTotal => &mut self.ram_total,
            MetricField::RamUsed => &mut self.ram_used,
            MetricField::DiskTotal => &mut self.disk_total,
            MetricField::DiskUsage => &mut self.disk_usage,
            MetricField::ProcessCount => &mut self.process_count,
            MetricField::LoadAverage => &mut self.load_average,
        };
        *slot = value;
    }

    /// The field's value, or its documented fallback text.
    pub fn display(&self, field: MetricField) -> &str {
        self.get(field).as_deref().unwrap_or(field.fallback())
    }

    pub fn unavailable_fields(&self) -> Vec<MetricField> {
        MetricField::ALL
            .into_iter()
            .filter(|field| !self.get(*field).is_available())
            .collect()
    }
}

/// Result of a full probe: a snapshot, or an absent one with the connection diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ProbeOutcome {
    Online(MetricsSnapshot),
    Offline { diagnostic: Option<String> },
}

impl ProbeOutcome {
    pub fn is_online(&self) -> bool {
        matches!(self, ProbeOutcome::Online(_))
    }

    pub fn snapshot(&self) -> Option<&MetricsSnapshot> {
        match self {
            ProbeOutcome::Online(snapshot) => Some(snapshot),
            ProbeOutcome::Offline { .. } => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Online(_) => None,
            ProbeOutcome::Offline { diagnostic } => diagnostic.as_deref(),
        }
    }
}
