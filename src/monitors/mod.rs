//! Host monitors
//!
//! A [`HostMonitor`] wraps one metric producer together with the identity of
//! the host it observes. The scheduler, the cache and the API only ever see
//! `Arc<dyn HostMonitor>`; whether the numbers come from this machine or over
//! SSH is decided once, when the monitors are built from the configuration.

pub mod local;
pub mod remote;
pub mod ssh;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{HostConfig, HostKind, MonitorConfig};
use crate::{HostIdentity, MetricField, ProbeOutcome};

use self::local::LocalMonitor;
use self::remote::RemoteMonitor;
use self::ssh::{OpenSshConnector, SshOptions};

/// Errors raised while probing a host.
///
/// None of these leave a monitor: connection failures become
/// [`ProbeOutcome::Offline`] and field failures become
/// [`crate::MetricValue::Unavailable`].
#[derive(Debug)]
pub enum ProbeError {
    /// The SSH client binary could not be started
    Spawn(std::io::Error),

    /// Connecting or authenticating failed; carries the client's diagnostic
    Connect(String),

    /// An operation did not finish in time
    Timeout { operation: String, after: Duration },

    /// A remote command exited unsuccessfully
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A command succeeded but its output did not contain the field
    Parse(MetricField),

    /// The local collection worker panicked or was cancelled
    Worker(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Spawn(err) => write!(f, "failed to start ssh client: {err}"),
            ProbeError::Connect(diagnostic) => f.write_str(diagnostic),
            ProbeError::Timeout { operation, after } => {
                write!(f, "{operation} timed out after {}s", after.as_secs_f64())
            }
            ProbeError::CommandFailed {
                command,
                code,
                stderr,
            } => {
                let code = code.map_or_else(|| "signal".to_string(), |code| code.to_string());
                write!(f, "'{command}' exited with {code}: {}", stderr.trim())
            }
            ProbeError::Parse(field) => write!(f, "could not parse {field} from command output"),
            ProbeError::Worker(reason) => write!(f, "local collection failed: {reason}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

/// A probe target with a fixed identity.
#[async_trait]
pub trait HostMonitor: Send + Sync {
    fn identity(&self) -> &HostIdentity;

    /// Full metrics probe. Never fails: an unreachable host is `Offline`.
    async fn fetch(&self) -> ProbeOutcome;

    /// Cheap liveness check (connect and authenticate only).
    async fn is_reachable(&self) -> bool;
}

/// Build one monitor per configured host.
///
/// When `include_local` is set and no configured entry points at this machine,
/// a local monitor named after the system hostname is placed first.
pub fn build_monitors(hosts: &[HostConfig], config: &MonitorConfig) -> Vec<Arc<dyn HostMonitor>> {
    let options = SshOptions::from(config);
    let mut monitors: Vec<Arc<dyn HostMonitor>> = Vec::with_capacity(hosts.len() + 1);

    if config.include_local && !hosts.iter().any(HostConfig::is_local) {
        let local = LocalMonitor::detect(config.command_timeout());
        info!("monitoring local machine as '{}'", local.identity());
        monitors.push(Arc::new(local));
    }

    for host in hosts {
        let identity = HostIdentity::new(&host.name, &host.address);
        match &host.kind {
            HostKind::Local => {
                monitors.push(Arc::new(LocalMonitor::with_identity(
                    identity,
                    config.command_timeout(),
                )));
            }
            HostKind::Remote(access) => {
                let connector =
                    OpenSshConnector::new(&host.address, access.clone(), options.clone());
                monitors.push(Arc::new(RemoteMonitor::new(
                    identity,
                    connector,
                    config.command_timeout(),
                )));
            }
        }
    }

    monitors
}
