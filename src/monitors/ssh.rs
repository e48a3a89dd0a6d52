//! SSH sessions over the system OpenSSH client
//!
//! Every probe opens its own control master in a private temporary directory.
//! The per-field commands then multiplex over that one authenticated
//! connection, and the master is torn down when the session is closed or
//! dropped. A master that misses its teardown exits by itself once it has
//! been idle for `control_persist`. Password authentication goes through `sshpass`, which reads the
//! password from the `SSHPASS` environment variable.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, instrument, trace, warn};

use crate::config::{MonitorConfig, RemoteAccess, SshAuth};
use crate::util::expand_home;

use super::ProbeError;

const SSH_BINARY: &str = "ssh";
const SSHPASS_BINARY: &str = "sshpass";
const CONTROL_SOCKET: &str = "control.sock";
const MASTER_LOG: &str = "master.log";

/// Opens authenticated sessions to one host.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: CommandSession;

    async fn connect(&self) -> Result<Self::Session, ProbeError>;
}

/// An open session that can run shell commands.
#[async_trait]
pub trait CommandSession: Send + Sync {
    /// Run `command` and return its stdout.
    async fn exec(&self, command: &str) -> Result<String, ProbeError>;

    /// Tear the session down. Dropping an unclosed session does the same in
    /// the background.
    async fn close(&mut self);
}

/// Client options shared by every host
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub strict_host_key_checking: bool,
    pub known_hosts_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// Idle time after which an orphaned master exits on its own
    pub control_persist: Duration,
}

impl From<&MonitorConfig> for SshOptions {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            strict_host_key_checking: config.strict_host_key_checking,
            known_hosts_file: config.known_hosts_file.as_deref().map(expand_home),
            connect_timeout: config.command_timeout(),
            command_timeout: config.command_timeout(),
            control_persist: config.command_timeout() * 3,
        }
    }
}

/// Connector for one remote host using `ssh` (and `sshpass` for passwords).
#[derive(Debug, Clone)]
pub struct OpenSshConnector {
    address: String,
    access: RemoteAccess,
    options: SshOptions,
}

impl OpenSshConnector {
    pub fn new(address: &str, access: RemoteAccess, options: SshOptions) -> Self {
        Self {
            address: address.to_string(),
            access,
            options,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.access.user, self.address)
    }

    /// Arguments that establish the master connection.
    fn master_args(&self, socket: &Path) -> Vec<String> {
        let strict = if self.options.strict_host_key_checking {
            "yes"
        } else {
            "accept-new"
        };

        let mut args = vec![
            "-M".to_string(),
            "-N".to_string(),
            "-f".to_string(),
            "-S".to_string(),
            socket.display().to_string(),
            "-o".to_string(),
            format!("ControlPersist={}s", self.options.control_persist.as_secs().max(1)),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            format!("StrictHostKeyChecking={strict}"),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ];

        if let Some(known_hosts) = &self.options.known_hosts_file {
            args.push("-o".to_string());
            args.push(format!("UserKnownHostsFile={}", known_hosts.display()));
        }

        match &self.access.auth {
            SshAuth::Key(path) => {
                args.extend([
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                    "-o".to_string(),
                    "IdentitiesOnly=yes".to_string(),
                    "-i".to_string(),
                    path.display().to_string(),
                ]);
            }
            SshAuth::Password(_) => {
                args.extend([
                    "-o".to_string(),
                    "PreferredAuthentications=password,keyboard-interactive".to_string(),
                    "-o".to_string(),
                    "PubkeyAuthentication=no".to_string(),
                    "-o".to_string(),
                    "NumberOfPasswordPrompts=1".to_string(),
                ]);
            }
        }

        args.extend([
            "-p".to_string(),
            self.access.port.to_string(),
            self.destination(),
        ]);
        args
    }

    fn master_command(&self, socket: &Path) -> Command {
        let mut command = match &self.access.auth {
            SshAuth::Key(_) => Command::new(SSH_BINARY),
            SshAuth::Password(password) => {
                let mut command = Command::new(SSHPASS_BINARY);
                command.arg("-e").arg(SSH_BINARY).env("SSHPASS", password);
                command
            }
        };
        command.args(self.master_args(socket));
        command
    }
}

#[async_trait]
impl Connector for OpenSshConnector {
    type Session = OpenSshSession;

    #[instrument(skip(self), fields(host = %self.address))]
    async fn connect(&self) -> Result<OpenSshSession, ProbeError> {
        let dir = tempfile::Builder::new()
            .prefix("fleetwatch-ssh-")
            .tempdir()
            .map_err(ProbeError::Spawn)?;
        let socket = dir.path().join(CONTROL_SOCKET);
        let log_path = dir.path().join(MASTER_LOG);
        let log = std::fs::File::create(&log_path).map_err(ProbeError::Spawn)?;

        let mut command = self.master_command(&socket);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true);

        // the foreground process exits once the master is authenticated and
        // has forked into the background
        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProbeError::Connect(format!(
                "{} not found: {e}",
                match self.access.auth {
                    SshAuth::Key(_) => SSH_BINARY,
                    SshAuth::Password(_) => SSHPASS_BINARY,
                }
            )),
            _ => ProbeError::Spawn(e),
        })?;

        // leave headroom over the client's own ConnectTimeout
        let limit = self.options.connect_timeout * 2;
        let status = match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status.map_err(ProbeError::Spawn)?,
            Err(_) => {
                return Err(ProbeError::Timeout {
                    operation: format!("connection to {}", self.address),
                    after: limit,
                });
            }
        };

        if !status.success() {
            let log = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
            return Err(ProbeError::Connect(connect_diagnostic(
                &self.access.auth,
                status,
                &log,
            )));
        }

        debug!("ssh master established");
        Ok(OpenSshSession {
            dir: Some(dir),
            socket,
            destination: self.destination(),
            port: self.access.port,
            command_timeout: self.options.command_timeout,
        })
    }
}

/// Map a failed master start to a readable diagnostic.
fn connect_diagnostic(auth: &SshAuth, status: ExitStatus, log: &str) -> String {
    if matches!(auth, SshAuth::Password(_)) {
        match status.code() {
            Some(5) => return "Authentication failed: invalid password".to_string(),
            Some(6) => return "Host key verification failed: host key unknown".to_string(),
            _ => {}
        }
    }

    log.lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match status.code() {
            Some(code) => format!("ssh exited with status {code}"),
            None => "ssh was terminated by a signal".to_string(),
        })
}

/// An authenticated control master for one probe.
#[derive(Debug)]
pub struct OpenSshSession {
    /// Holds the control socket; `None` once the session is closed
    dir: Option<TempDir>,
    socket: PathBuf,
    destination: String,
    port: u16,
    command_timeout: Duration,
}

impl OpenSshSession {
    fn client(&self) -> Command {
        let mut command = Command::new(SSH_BINARY);
        command
            .arg("-S")
            .arg(&self.socket)
            .args(["-o", "ControlMaster=no", "-o", "BatchMode=yes", "-p"])
            .arg(self.port.to_string());
        command
    }

    fn exit_command(&self) -> std::process::Command {
        let mut command = std::process::Command::new(SSH_BINARY);
        command
            .arg("-S")
            .arg(&self.socket)
            .args(["-O", "exit", "-p"])
            .arg(self.port.to_string())
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

#[async_trait]
impl CommandSession for OpenSshSession {
    async fn exec(&self, command: &str) -> Result<String, ProbeError> {
        let mut client = self.client();
        client
            .arg(&self.destination)
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.command_timeout, client.output()).await {
            Ok(output) => output.map_err(ProbeError::Spawn)?,
            Err(_) => {
                return Err(ProbeError::Timeout {
                    operation: format!("'{command}'"),
                    after: self.command_timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("'{command}' returned: {stdout:?}");

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                command: command.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(stdout)
    }

    async fn close(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        let mut exit = Command::from(self.exit_command());
        exit.kill_on_drop(true);
        match tokio::time::timeout(self.command_timeout, exit.status()).await {
            Ok(Ok(status)) if status.success() => debug!("ssh master closed"),
            Ok(Ok(status)) => {
                warn!("closing ssh master exited with {status}, leaving it to expire")
            }
            Ok(Err(e)) => warn!("failed to close ssh master: {e}, leaving it to expire"),
            Err(_) => warn!("closing ssh master timed out, leaving it to expire"),
        }

        drop(dir);
    }
}

impl Drop for OpenSshSession {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        // the socket directory must outlive `ssh -O exit`
        debug!("ssh session dropped without close, tearing down master");
        match self.exit_command().spawn() {
            Ok(mut child) => {
                let reaper = std::thread::Builder::new()
                    .name("ssh-teardown".to_string())
                    .spawn(move || {
                        if let Err(e) = child.wait() {
                            warn!("failed to close ssh master: {e}");
                        }
                        drop(dir);
                    });
                if let Err(e) = reaper {
                    warn!("failed to start ssh teardown thread: {e}");
                }
            }
            Err(e) => {
                warn!("failed to close ssh master: {e}");
                drop(dir);
            }
        }
    }
}
