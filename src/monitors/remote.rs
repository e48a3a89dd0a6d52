use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::{HostIdentity, MetricField, MetricValue, MetricsSnapshot, ProbeOutcome};

use super::ssh::{CommandSession, Connector, OpenSshConnector};
use super::{HostMonitor, ProbeError};

/// Shell command answering each metric field
pub fn field_command(field: MetricField) -> &'static str {
    match field {
        MetricField::CpuModel => "grep -m1 'model name' /proc/cpuinfo",
        MetricField::CpuUsage => "top -bn1 | grep 'Cpu(s)'",
        MetricField::RamTotal | MetricField::RamUsed => "free -h",
        MetricField::DiskTotal | MetricField::DiskUsage => "df -h /",
        MetricField::ProcessCount => "ps aux | wc -l",
        MetricField::LoadAverage => "uptime",
    }
}

static CPU_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Cpu\(s\):\s*([0-9]+(?:[.,][0-9]+)?)").expect("valid cpu usage regex")
});

static LOAD_AVERAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"load averages?:\s*([0-9]+[.,][0-9]+)").expect("valid load average regex")
});

fn column(line: &str, index: usize) -> Option<String> {
    line.split_whitespace().nth(index).map(str::to_string)
}

/// Extract one field from the output of [`field_command`].
pub fn parse_field(field: MetricField, output: &str) -> Option<String> {
    match field {
        MetricField::CpuModel => output
            .lines()
            .find(|line| line.contains("model name"))
            .and_then(|line| line.split_once(':'))
            .map(|(_, model)| model.trim().to_string())
            .filter(|model| !model.is_empty()),
        MetricField::CpuUsage => CPU_USER
            .captures(output)
            .and_then(|caps| caps[1].replace(',', ".").parse::<f64>().ok())
            .map(|usage| format!("{usage:.1}%")),
        MetricField::RamTotal | MetricField::RamUsed => {
            let index = if field == MetricField::RamTotal { 1 } else { 2 };
            output
                .lines()
                .find(|line| line.trim_start().starts_with("Mem:"))
                .and_then(|line| column(line, index))
        }
        MetricField::DiskTotal | MetricField::DiskUsage => {
            let index = if field == MetricField::DiskTotal { 1 } else { 4 };
            output
                .lines()
                .filter(|line| !line.trim().is_empty())
                .skip(1)
                .last()
                .and_then(|line| column(line, index))
        }
        MetricField::ProcessCount => output
            .trim()
            .parse::<u64>()
            .ok()
            .map(|lines| lines.saturating_sub(1).to_string()),
        MetricField::LoadAverage => LOAD_AVERAGE
            .captures(output)
            .map(|caps| caps[1].replace(',', ".")),
    }
}

/// A host probed over SSH, one fresh session per call.
pub struct RemoteMonitor<C = OpenSshConnector> {
    identity: HostIdentity,
    connector: C,
    command_timeout: Duration,
}

impl<C: Connector> RemoteMonitor<C> {
    pub fn new(identity: HostIdentity, connector: C, command_timeout: Duration) -> Self {
        Self {
            identity,
            connector,
            command_timeout,
        }
    }

    async fn probe_field(&self, session: &C::Session, field: MetricField) -> MetricValue {
        let command = field_command(field);
        let output = match tokio::time::timeout(self.command_timeout, session.exec(command)).await {
            Ok(output) => output,
            Err(_) => Err(ProbeError::Timeout {
                operation: format!("'{command}'"),
                after: self.command_timeout,
            }),
        };

        let parsed = output
            .and_then(|output| parse_field(field, &output).ok_or(ProbeError::Parse(field)));
        match parsed {
            Ok(value) => MetricValue::Available(value),
            Err(e) => {
                debug!("{field} unavailable: {e}");
                MetricValue::Unavailable
            }
        }
    }
}

#[async_trait]
impl<C: Connector> HostMonitor for RemoteMonitor<C> {
    fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    #[instrument(skip(self), fields(host = %self.identity.name))]
    async fn fetch(&self) -> ProbeOutcome {
        let mut session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                warn!("{} is offline: {e}", self.identity);
                return ProbeOutcome::Offline {
                    diagnostic: Some(e.to_string()),
                };
            }
        };

        let values = join_all(
            MetricField::ALL
                .into_iter()
                .map(|field| self.probe_field(&session, field)),
        )
        .await;
        session.close().await;

        let mut snapshot = MetricsSnapshot::empty(&self.identity);
        for (field, value) in MetricField::ALL.into_iter().zip(values) {
            snapshot.set(field, value);
        }
        snapshot.captured_at = Utc::now();

        ProbeOutcome::Online(snapshot)
    }

    #[instrument(skip(self), fields(host = %self.identity.name))]
    async fn is_reachable(&self) -> bool {
        match self.connector.connect().await {
            Ok(mut session) => {
                session.close().await;
                true
            }
            Err(e) => {
                debug!("{} is unreachable: {e}", self.identity);
                false
            }
        }
    }
}
