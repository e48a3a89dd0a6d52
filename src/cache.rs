//! Short-lived per-host memoization of probe results
//!
//! Each host owns one slot with its own async mutex. The mutex is held while
//! a refresh is in flight, so concurrent requests for the same host share one
//! probe while different hosts never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::ProbeOutcome;
use crate::monitors::HostMonitor;

/// The last probe result of a host and when it was taken.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub outcome: ProbeOutcome,
    pub captured_at: Instant,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.captured_at)
    }
}

struct Slot {
    monitor: Arc<dyn HostMonitor>,
    entry: Mutex<Option<CacheEntry>>,
}

pub struct StatusCache {
    slots: HashMap<String, Slot>,
}

impl StatusCache {
    pub fn new(monitors: &[Arc<dyn HostMonitor>]) -> Self {
        let slots = monitors
            .iter()
            .map(|monitor| {
                (
                    monitor.identity().name.clone(),
                    Slot {
                        monitor: monitor.clone(),
                        entry: Mutex::new(None),
                    },
                )
            })
            .collect();

        Self { slots }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.slots.contains_key(host)
    }

    /// Outcome for `host`, probing only when the cached one is older than
    /// `max_age` or `force_refresh` is set. `None` for an unknown host.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        host: &str,
        max_age: Duration,
        force_refresh: bool,
    ) -> Option<ProbeOutcome> {
        let slot = self.slots.get(host)?;
        let mut entry = slot.entry.lock().await;

        if !force_refresh
            && let Some(cached) = entry.as_ref()
            && cached.age() < max_age
        {
            debug!("serving cached outcome ({:?} old)", cached.age());
            return Some(cached.outcome.clone());
        }

        let outcome = slot.monitor.fetch().await;
        *entry = Some(CacheEntry {
            outcome: outcome.clone(),
            captured_at: Instant::now(),
        });

        Some(outcome)
    }

    /// Last cached outcome without probing.
    pub async fn peek(&self, host: &str) -> Option<CacheEntry> {
        self.slots.get(host)?.entry.lock().await.clone()
    }
}
