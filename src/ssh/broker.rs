//! Connection broker process management.
//!
//! The broker is a local helper that bridges a loopback TCP port to the
//! codespace's private network. It is started as
//! `<program> <args..> -w <workspace id>` with a cleared environment holding
//! only `PATH` and the access token, so the token never shows up in the
//! process list.
//!
//! The launcher does not wait for the broker to listen; the establisher
//! probes the endpoint before the SSH handshake.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::config;
use super::descriptor::SessionDescriptor;
use super::error::SessionError;
use super::transport::{Broker, Launcher};

/// Environment variable the broker reads its access token from
pub(crate) const BROKER_TOKEN_ENV_VAR: &str = "CODESPACE_TOKEN";

/// How to start the broker and where it listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub port: u16,
}

impl BrokerConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            args,
            port,
        }
    }

    /// Command-line values win over `CODESPACE_BROKER_*` variables.
    pub fn resolve(program: Option<String>, port: Option<u16>) -> Self {
        Self::new(
            config::resolve_broker_program(program),
            vec![config::resolve_broker_script(None)],
            config::resolve_broker_port(port),
        )
    }

    /// Loopback address the broker listens on.
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

/// Build the broker command for a located program.
pub(crate) fn build_command(
    program: &Path,
    config: &BrokerConfig,
    descriptor: &SessionDescriptor,
) -> Command {
    let mut command = Command::new(program);
    command
        .args(config.args.iter().filter(|arg| !arg.is_empty()))
        .arg("-w")
        .arg(descriptor.workspace_id())
        .env_clear()
        .env(BROKER_TOKEN_ENV_VAR, descriptor.token())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    if let Some(path) = env::var_os("PATH") {
        command.env("PATH", path);
    }

    command
}

/// Starts broker processes from a [`BrokerConfig`].
#[derive(Debug, Clone)]
pub struct BrokerLauncher {
    config: BrokerConfig,
}

impl BrokerLauncher {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Launcher for BrokerLauncher {
    type Broker = BrokerProcess;

    async fn launch(&self, descriptor: &SessionDescriptor) -> Result<BrokerProcess, SessionError> {
        let program = which::which(&self.config.program).map_err(|e| {
            SessionError::BrokerLaunch(format!(
                "could not locate {}: {}",
                self.config.program, e
            ))
        })?;

        let child = build_command(&program, &self.config, descriptor)
            .spawn()
            .map_err(|e| {
                SessionError::BrokerLaunch(format!("failed to start {:?}: {}", program, e))
            })?;

        info!(
            pid = child.id(),
            port = self.config.port,
            "Started connection broker {}",
            program.display()
        );

        Ok(BrokerProcess { child })
    }
}

/// Handle to a running broker; the child is killed if the handle is dropped.
#[derive(Debug)]
pub struct BrokerProcess {
    child: Child,
}

#[async_trait]
impl Broker for BrokerProcess {
    async fn wait(&mut self) -> Result<ExitStatus, SessionError> {
        self.child.wait().await.map_err(|e| {
            SessionError::BrokerLaunch(format!("failed to wait for broker: {}", e))
        })
    }

    async fn terminate(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("Connection broker already exited: {}", status);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to poll connection broker: {}", e),
        }

        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill connection broker: {}", e);
        }

        match self.child.wait().await {
            Ok(status) => debug!("Connection broker reaped: {}", status),
            Err(e) => warn!("Failed to reap connection broker: {}", e),
        }
    }
}
