//! Shared state passed to all API handlers

use std::sync::Arc;
use std::time::Duration;

use crate::HostIdentity;
use crate::cache::StatusCache;
use crate::storage::UptimeStore;

#[derive(Clone)]
pub struct ApiState {
    /// Configured hosts in display order
    pub hosts: Arc<Vec<HostIdentity>>,

    pub cache: Arc<StatusCache>,

    pub store: Arc<dyn UptimeStore>,

    /// How old a cached outcome may be before a status request probes again
    pub max_age: Duration,

    /// Window used when a request does not name one
    pub default_hours: u32,
}

impl ApiState {
    pub fn new(
        hosts: Vec<HostIdentity>,
        cache: Arc<StatusCache>,
        store: Arc<dyn UptimeStore>,
        max_age: Duration,
        default_hours: u32,
    ) -> Self {
        Self {
            hosts: Arc::new(hosts),
            cache,
            store,
            max_age,
            default_hours,
        }
    }

    pub fn host(&self, name: &str) -> Option<&HostIdentity> {
        self.hosts.iter().find(|host| host.name == name)
    }
}
