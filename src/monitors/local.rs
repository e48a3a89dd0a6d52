use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{Disks, System};
use tracing::{debug, instrument, warn};

use crate::util::bytes_to_human;
use crate::{HostIdentity, MetricValue, MetricsSnapshot, ProbeOutcome};

use super::{HostMonitor, ProbeError};

/// Metrics of the machine this process runs on, collected with `sysinfo`.
#[derive(Debug, Clone)]
pub struct LocalMonitor {
    identity: HostIdentity,
    timeout: Duration,
}

impl LocalMonitor {
    /// Identity derived from the system: `"<hostname> (localhost)"` and the
    /// address of the outbound interface.
    pub fn detect(timeout: Duration) -> Self {
        let hostname = System::host_name().unwrap_or_else(|| String::from("localhost"));
        let identity = HostIdentity::new(format!("{hostname} (localhost)"), local_address());
        Self::with_identity(identity, timeout)
    }

    pub fn with_identity(identity: HostIdentity, timeout: Duration) -> Self {
        Self { identity, timeout }
    }

    async fn collect(&self) -> Result<MetricsSnapshot, ProbeError> {
        let identity = self.identity.clone();
        let worker = tokio::task::spawn_blocking(move || collect_snapshot(&identity));

        match tokio::time::timeout(self.timeout, worker).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(e)) => Err(ProbeError::Worker(e.to_string())),
            Err(_) => Err(ProbeError::Timeout {
                operation: "local collection".to_string(),
                after: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl HostMonitor for LocalMonitor {
    fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    #[instrument(skip(self), fields(host = %self.identity.name))]
    async fn fetch(&self) -> ProbeOutcome {
        match self.collect().await {
            Ok(snapshot) => ProbeOutcome::Online(snapshot),
            Err(e) => {
                warn!("{e}, reporting every field as unavailable");
                ProbeOutcome::Online(MetricsSnapshot::empty(&self.identity))
            }
        }
    }

    async fn is_reachable(&self) -> bool {
        true
    }
}

/// Address of the interface that routes to the internet.
///
/// Connecting a UDP socket only selects a route, no packet is sent.
pub fn local_address() -> String {
    let discovered = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip());

    match discovered {
        Ok(ip) if !ip.is_unspecified() => ip.to_string(),
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST).to_string(),
        Err(e) => {
            debug!("could not discover local address: {e}");
            IpAddr::V4(Ipv4Addr::LOCALHOST).to_string()
        }
    }
}

fn available(value: Option<String>) -> MetricValue {
    value.map_or(MetricValue::Unavailable, MetricValue::Available)
}

/// Blocking collection, run on the blocking pool.
fn collect_snapshot(identity: &HostIdentity) -> MetricsSnapshot {
    let mut sys = System::new_all();
    sys.refresh_all();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    let mut snapshot = MetricsSnapshot::empty(identity);

    snapshot.cpu_model = available(
        sys.cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty()),
    );
    snapshot.cpu_usage = MetricValue::Available(format!("{:.1}%", sys.global_cpu_usage()));

    let total_memory = sys.total_memory();
    if total_memory > 0 {
        snapshot.ram_total = MetricValue::Available(bytes_to_human(total_memory));
        snapshot.ram_used = MetricValue::Available(bytes_to_human(sys.used_memory()));
    }

    let disks = Disks::new_with_refreshed_list();
    if let Some(root) = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        && root.total_space() > 0
    {
        let total = root.total_space();
        let used = total.saturating_sub(root.available_space());
        snapshot.disk_total = MetricValue::Available(bytes_to_human(total));
        snapshot.disk_usage =
            MetricValue::Available(format!("{:.0}%", used as f64 / total as f64 * 100.0));
    }

    snapshot.process_count = MetricValue::Available(sys.processes().len().to_string());

    if !cfg!(windows) {
        snapshot.load_average =
            MetricValue::Available(format!("{:.2}", System::load_average().one));
    }

    snapshot.captured_at = Utc::now();

    let missing = snapshot.unavailable_fields();
    if !missing.is_empty() {
        debug!("local fields unavailable: {missing:?}");
    }

    snapshot
}
