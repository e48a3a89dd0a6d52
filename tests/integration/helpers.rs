//! Helper types for integration tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleetwatch::anchors::AnchorStore;
use fleetwatch::cache::StatusCache;
use fleetwatch::config::MonitorConfig;
use fleetwatch::discord::Message;
use fleetwatch::monitors::HostMonitor;
use fleetwatch::presenter::{ArtifactHandle, PresentationError, Presenter};
use fleetwatch::render::status_message;
use fleetwatch::scheduler::{Scheduler, SchedulerSettings};
use fleetwatch::storage::{UptimeStore, UptimeWindow};
use fleetwatch::{HostIdentity, MetricField, MetricValue, MetricsSnapshot, ProbeOutcome};
use tokio::time::Instant;

/// Monitor with a fixed latency whose reachability can be flipped at runtime
pub struct FakeMonitor {
    identity: HostIdentity,
    latency: Duration,
    online: AtomicBool,
    fetches: AtomicUsize,
    started: Mutex<Vec<Instant>>,
}

impl FakeMonitor {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            identity: HostIdentity::new(name, address),
            latency: Duration::ZERO,
            online: AtomicBool::new(true),
            fetches: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn offline(self) -> Self {
        self.set_online(false);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    async fn work(&self) {
        self.started.lock().unwrap().push(Instant::now());
        tokio::time::sleep(self.latency).await;
    }
}

#[async_trait]
impl HostMonitor for FakeMonitor {
    fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    async fn fetch(&self) -> ProbeOutcome {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.work().await;

        if !self.online.load(Ordering::SeqCst) {
            return ProbeOutcome::Offline {
                diagnostic: Some("Connection timed out".to_string()),
            };
        }

        let mut snapshot = MetricsSnapshot::empty(&self.identity);
        snapshot.set(
            MetricField::CpuUsage,
            MetricValue::Available("12.5%".to_string()),
        );
        ProbeOutcome::Online(snapshot)
    }

    async fn is_reachable(&self) -> bool {
        self.work().await;
        self.online.load(Ordering::SeqCst)
    }
}

pub fn as_monitors(fakes: &[Arc<FakeMonitor>]) -> Vec<Arc<dyn HostMonitor>> {
    fakes
        .iter()
        .map(|fake| fake.clone() as Arc<dyn HostMonitor>)
        .collect()
}

pub fn fleet(names: &[&str]) -> Vec<Arc<FakeMonitor>> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| Arc::new(FakeMonitor::new(name, &format!("10.0.0.{}", index + 1))))
        .collect()
}

/// Presenter that keeps every rendered message in memory
#[derive(Default)]
pub struct RecordingPresenter {
    pub posted: Mutex<Vec<(Message, Option<ArtifactHandle>)>>,
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn wait_until_ready(&self) -> Result<(), PresentationError> {
        Ok(())
    }

    fn render_snapshot(
        &self,
        identity: &HostIdentity,
        outcome: &ProbeOutcome,
        window: &UptimeWindow,
    ) -> Message {
        status_message(identity, outcome, window, 48)
    }

    async fn post_or_update(
        &self,
        message: &Message,
        prior: Option<&ArtifactHandle>,
    ) -> Result<ArtifactHandle, PresentationError> {
        let mut posted = self.posted.lock().unwrap();
        posted.push((message.clone(), prior.cloned()));
        Ok(prior
            .cloned()
            .unwrap_or_else(|| ArtifactHandle(format!("msg-{}", posted.len()))))
    }
}

pub fn scheduler(
    fakes: &[Arc<FakeMonitor>],
    store: Arc<dyn UptimeStore>,
    anchors_file: &Path,
) -> (Arc<Scheduler>, Arc<RecordingPresenter>) {
    let monitors = as_monitors(fakes);
    let presenter = Arc::new(RecordingPresenter::default());
    let scheduler = Scheduler::new(
        monitors.clone(),
        Arc::new(StatusCache::new(&monitors)),
        store,
        presenter.clone(),
        Arc::new(AnchorStore::empty(anchors_file)),
        SchedulerSettings::from(&MonitorConfig {
            spread_secs: 0.0,
            ..Default::default()
        }),
    );
    (Arc::new(scheduler), presenter)
}
