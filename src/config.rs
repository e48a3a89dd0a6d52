use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing::{info, trace, warn};

use crate::util::expand_home;

const DEFAULT_SSH_PORT: u16 = 22;

/// Longest uptime window, one week of hourly slots
pub const MAX_HISTORY_HOURS: u32 = 168;

const MAX_SPREAD_SECS: f64 = 60.0;

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory history (lost on restart)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./uptime_history.db")
}

/// Scheduling and probing parameters
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_secs: u64,
    /// Delay between the start of consecutive hosts within one cycle
    #[serde(default = "default_spread")]
    pub spread_secs: f64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_host_timeout")]
    pub host_timeout_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_history_hours")]
    pub history_hours: u32,
    #[serde(default)]
    pub strict_host_key_checking: bool,
    pub known_hosts_file: Option<String>,
    /// Monitor this machine even when it is not listed in `hosts`
    #[serde(default = "default_true")]
    pub include_local: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            liveness_interval_secs: default_liveness_interval(),
            spread_secs: default_spread(),
            command_timeout_secs: default_command_timeout(),
            host_timeout_secs: default_host_timeout(),
            retention_days: default_retention_days(),
            history_hours: default_history_hours(),
            strict_host_key_checking: false,
            known_hosts_file: None,
            include_local: true,
        }
    }
}

impl MonitorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs.max(1))
    }

    pub fn spread(&self) -> Duration {
        Duration::try_from_secs_f64(self.spread_secs).unwrap_or_default()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs.max(1))
    }

    /// Reject values the history window, the prune and the stagger cannot honor.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_HISTORY_HOURS).contains(&self.history_hours) {
            bail!(
                "monitor.history_hours must be between 1 and {MAX_HISTORY_HOURS}, got {}",
                self.history_hours
            );
        }
        if self.retention_days == 0 {
            bail!("monitor.retention_days must be at least 1");
        }
        if u64::from(self.retention_days) * 24 < u64::from(self.history_hours) {
            bail!(
                "monitor.retention_days ({}) is shorter than monitor.history_hours ({})",
                self.retention_days,
                self.history_hours
            );
        }
        if !self.spread_secs.is_finite() || !(0.0..=MAX_SPREAD_SECS).contains(&self.spread_secs) {
            bail!(
                "monitor.spread_secs must be between 0 and {MAX_SPREAD_SECS}, got {}",
                self.spread_secs
            );
        }
        Ok(())
    }
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_liveness_interval() -> u64 {
    3600
}

fn default_spread() -> f64 {
    0.5
}

fn default_command_timeout() -> u64 {
    10
}

fn default_host_timeout() -> u64 {
    60
}

fn default_retention_days() -> u32 {
    7
}

fn default_history_hours() -> u32 {
    48
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_anchors_file")]
    pub anchors_file: PathBuf,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            anchors_file: default_anchors_file(),
            api_base: default_api_base(),
        }
    }
}

fn default_anchors_file() -> PathBuf {
    PathBuf::from("message_ids.json")
}

fn default_api_base() -> String {
    String::from("https://discord.com/api/v10")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// On-disk layout of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    /// Kept untyped so that one malformed entry does not reject the whole file
    #[serde(default)]
    hosts: Vec<serde_json::Value>,
    #[serde(default)]
    monitor: MonitorConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    discord: DiscordConfig,
    #[serde(default)]
    api: ApiConfig,
}

/// A single `hosts` entry before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHostEntry {
    pub name: Option<String>,
    #[serde(alias = "address")]
    pub ip: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_user: Option<String>,
    pub ssh_key_path: Option<String>,
    pub ssh_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshAuth {
    Key(PathBuf),
    Password(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccess {
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Local,
    Remote(RemoteAccess),
}

/// A validated host entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub name: String,
    pub address: String,
    pub kind: HostKind,
}

impl HostConfig {
    pub fn is_local(&self) -> bool {
        matches!(self.kind, HostKind::Local)
    }
}

/// Why a host entry was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostConfigError {
    /// The entry is not an object of the expected shape
    Malformed { index: usize, reason: String },
    MissingField { index: usize, field: &'static str },
    DuplicateName(String),
    NoAuthMethod(String),
}

impl fmt::Display for HostConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostConfigError::Malformed { index, reason } => {
                write!(f, "host entry #{index} is malformed: {reason}")
            }
            HostConfigError::MissingField { index, field } => {
                write!(f, "host entry #{index} is missing required field '{field}'")
            }
            HostConfigError::DuplicateName(name) => {
                write!(f, "host '{name}' is defined more than once")
            }
            HostConfigError::NoAuthMethod(name) => write!(
                f,
                "host '{name}' has no authentication method (ssh_key_path or ssh_password)"
            ),
        }
    }
}

impl std::error::Error for HostConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub hosts: Vec<HostConfig>,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
    pub discord: DiscordConfig,
    pub api: ApiConfig,
}

pub fn is_local_address(address: &str) -> bool {
    matches!(address, "localhost" | "127.0.0.1" | "::1")
}

fn required(
    value: Option<String>,
    index: usize,
    field: &'static str,
) -> Result<String, HostConfigError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(HostConfigError::MissingField { index, field })
}

/// Validate one entry. Duplicate detection is done by [`validate_hosts`].
pub fn validate_host(index: usize, raw: RawHostEntry) -> Result<HostConfig, HostConfigError> {
    let name = required(raw.name, index, "name")?;
    let address = required(raw.ip, index, "ip")?;

    if is_local_address(&address) {
        return Ok(HostConfig {
            name,
            address,
            kind: HostKind::Local,
        });
    }

    let user = required(raw.ssh_user, index, "ssh_user")?;
    let key = raw.ssh_key_path.filter(|path| !path.trim().is_empty());
    let password = raw.ssh_password.filter(|password| !password.is_empty());

    let auth = match (key, password) {
        (Some(key), password) => {
            if password.is_some() {
                warn!("host '{name}': both ssh_key_path and ssh_password set, using the key");
            }
            SshAuth::Key(expand_home(key.trim()))
        }
        (None, Some(password)) => SshAuth::Password(password),
        (None, None) => return Err(HostConfigError::NoAuthMethod(name)),
    };

    Ok(HostConfig {
        name,
        address,
        kind: HostKind::Remote(RemoteAccess {
            port: raw.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
            user,
            auth,
        }),
    })
}

/// Validate every entry individually; invalid ones are returned next to the
/// valid set instead of failing it.
pub fn validate_hosts(entries: Vec<serde_json::Value>) -> (Vec<HostConfig>, Vec<HostConfigError>) {
    let mut hosts = Vec::with_capacity(entries.len());
    let mut errors = vec![];
    let mut seen = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let validated = serde_json::from_value::<RawHostEntry>(entry)
            .map_err(|e| HostConfigError::Malformed {
                index,
                reason: e.to_string(),
            })
            .and_then(|raw| validate_host(index, raw))
            .and_then(|host| {
                if seen.insert(host.name.clone()) {
                    Ok(host)
                } else {
                    Err(HostConfigError::DuplicateName(host.name))
                }
            });

        match validated {
            Ok(host) => hosts.push(host),
            Err(e) => errors.push(e),
        }
    }

    (hosts, errors)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    let raw: RawConfig =
        serde_json::from_str(content).context("invalid configuration file provided")?;

    raw.monitor.validate()?;

    let (hosts, errors) = validate_hosts(raw.hosts);
    for error in &errors {
        warn!("dropping host entry: {error}");
    }

    Ok(Config {
        hosts,
        monitor: raw.monitor,
        storage: raw.storage,
        discord: raw.discord,
        api: raw.api,
    })
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let config = parse_config(&file_content)?;
    if config.hosts.is_empty() {
        info!("no remote hosts configured, only localhost will be monitored");
    }
    trace!("loaded config: {config:?}");

    Ok(config)
}
