//! Periodic jobs
//!
//! Two independent loops share the monitors:
//!
//! - **refresh**: force-probe every host, render its status together with the
//!   uptime window and post or edit its message
//! - **liveness**: record one up/down observation per host, then prune
//!   history beyond the retention window
//!
//! Within a cycle hosts run concurrently, started `spread` apart. Cycles of
//! one job never overlap; a tick that falls due while a cycle is still
//! running is skipped.

mod stagger;

pub use stagger::{CycleReport, run_staggered};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::anchors::AnchorStore;
use crate::cache::StatusCache;
use crate::config::MonitorConfig;
use crate::monitors::HostMonitor;
use crate::presenter::{PresentationError, Presenter};
use crate::storage::{UptimeStore, UptimeWindow};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub refresh_interval: Duration,
    pub liveness_interval: Duration,
    pub spread: Duration,
    pub host_timeout: Duration,
    /// Upper bound of a single reachability check
    pub reachability_timeout: Duration,
    pub retention_days: u32,
    pub history_hours: u32,
}

impl From<&MonitorConfig> for SchedulerSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            refresh_interval: config.refresh_interval(),
            liveness_interval: config.liveness_interval(),
            spread: config.spread(),
            host_timeout: config.host_timeout(),
            reachability_timeout: (config.command_timeout() * 3).min(config.host_timeout()),
            retention_days: config.retention_days,
            history_hours: config.history_hours,
        }
    }
}

pub struct Scheduler {
    monitors: Vec<Arc<dyn HostMonitor>>,
    cache: Arc<StatusCache>,
    store: Arc<dyn UptimeStore>,
    presenter: Arc<dyn Presenter>,
    anchors: Arc<AnchorStore>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        monitors: Vec<Arc<dyn HostMonitor>>,
        cache: Arc<StatusCache>,
        store: Arc<dyn UptimeStore>,
        presenter: Arc<dyn Presenter>,
        anchors: Arc<AnchorStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            monitors,
            cache,
            store,
            presenter,
            anchors,
            settings,
        }
    }

    /// Wait for the presenter, then run both jobs until `shutdown` resolves.
    pub async fn run(
        self: Arc<Self>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), PresentationError> {
        tokio::pin!(shutdown);

        tokio::select! {
            ready = self.presenter.wait_until_ready() => ready?,
            _ = &mut shutdown => {
                info!("shutdown requested before the presenter was ready");
                return Ok(());
            }
        }

        info!(
            "starting jobs for {} hosts (refresh every {:?}, liveness every {:?})",
            self.monitors.len(),
            self.settings.refresh_interval,
            self.settings.liveness_interval
        );

        let refresh = tokio::spawn(self.clone().refresh_job());
        let liveness = tokio::spawn(self.clone().liveness_job());

        shutdown.await;
        info!("stopping jobs");
        refresh.abort();
        liveness.abort();
        // wait until the cancelled cycles have dropped their host tasks
        let _ = tokio::join!(refresh, liveness);

        // a refresh cut short may have posted messages not yet written out
        if let Err(e) = self.anchors.save().await {
            error!("failed to save message anchors: {e:#}");
        }

        Ok(())
    }

    async fn refresh_job(self: Arc<Self>) {
        let mut ticker = interval(self.settings.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = self.refresh_cycle().await;
            info!("refresh cycle: {report}");
        }
    }

    async fn liveness_job(self: Arc<Self>) {
        let mut ticker = interval(self.settings.liveness_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = self.liveness_cycle().await;
            info!("liveness cycle: {report}");
        }
    }

    /// Probe every host and publish its status; anchors are saved afterwards.
    #[instrument(skip_all)]
    pub async fn refresh_cycle(self: &Arc<Self>) -> CycleReport {
        let this = self.clone();
        let report = run_staggered(
            &self.monitors,
            self.settings.spread,
            self.settings.host_timeout,
            move |monitor| {
                let this = this.clone();
                async move { this.refresh_host(monitor).await }
            },
        )
        .await;

        if let Err(e) = self.anchors.save().await {
            error!("failed to save message anchors: {e:#}");
        }

        report
    }

    async fn refresh_host(&self, monitor: Arc<dyn HostMonitor>) -> anyhow::Result<()> {
        let identity = monitor.identity();

        let outcome = self
            .cache
            .get(&identity.name, self.settings.refresh_interval, true)
            .await
            .context("host is not known to the status cache")?;

        let window = match self
            .store
            .render_window(&identity.name, self.settings.history_hours)
            .await
        {
            Ok(window) => window,
            Err(e) => {
                warn!("failed to load uptime history: {e}");
                UptimeWindow::NoData
            }
        };

        let message = self.presenter.render_snapshot(identity, &outcome, &window);
        let prior = self.anchors.get(&identity.name).await;
        let handle = self
            .presenter
            .post_or_update(&message, prior.as_ref())
            .await
            .context("failed to publish status")?;

        if prior.as_ref() != Some(&handle) {
            info!("posted new status message {handle}");
        } else {
            debug!("updated status message {handle}");
        }
        self.anchors.set(&identity.name, handle).await;

        Ok(())
    }

    /// Record one observation per host, then prune expired history once.
    #[instrument(skip_all)]
    pub async fn liveness_cycle(self: &Arc<Self>) -> CycleReport {
        let this = self.clone();
        let report = run_staggered(
            &self.monitors,
            self.settings.spread,
            self.settings.host_timeout,
            move |monitor| {
                let this = this.clone();
                async move { this.liveness_host(monitor).await }
            },
        )
        .await;

        match self.store.prune(self.settings.retention_days).await {
            Ok(0) => {}
            Ok(deleted) => info!("cleaned up {deleted} old uptime records"),
            Err(e) => error!("failed to prune uptime history: {e}"),
        }

        report
    }

    async fn liveness_host(&self, monitor: Arc<dyn HostMonitor>) -> anyhow::Result<()> {
        let name = &monitor.identity().name;

        let is_up = tokio::time::timeout(self.settings.reachability_timeout, monitor.is_reachable())
            .await
            .unwrap_or(false);

        self.store
            .record_status(name, is_up)
            .await
            .context("failed to record status")?;

        info!("uptime check: {name} - {}", if is_up { "Online" } else { "Offline" });
        Ok(())
    }
}
