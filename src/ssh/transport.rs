//! Seams between the session lifecycle and the concrete broker/SSH types.
//!
//! The lifecycle and relay are written against these traits so that teardown
//! ordering and relay cancellation can be exercised with in-memory fakes. The
//! production implementations live in `broker` and `client`.
//!
//! # Ownership
//!
//! - A [`Launcher`] produces one [`Broker`] per session.
//! - A [`Connector`] produces one [`SecureConnection`] per session.
//! - A [`SecureConnection`] opens exactly one [`SecureSession`].
//! - A started [`SecureSession`] hands out its input and output halves for the
//!   relay, but keeps the ability to close the channel.

use std::process::ExitStatus;

use async_trait::async_trait;

use super::descriptor::SessionDescriptor;
use super::error::SessionError;
use super::terminal::PtyRequest;

/// Something the remote side of a session reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Bytes for local standard output.
    Stdout(Vec<u8>),
    /// Bytes for local standard error.
    Stderr(Vec<u8>),
    /// The remote command exited with this status.
    ExitStatus(u32),
    /// The remote command was killed by this signal.
    ExitSignal(String),
    /// The remote side will send no more data.
    Eof,
}

/// Write half of a started session.
#[async_trait]
pub trait RemoteInput: Send + Sync {
    async fn send(&self, data: &[u8]) -> Result<(), SessionError>;

    /// Signal end of input to the remote command.
    async fn send_eof(&self) -> Result<(), SessionError>;
}

/// Read half of a started session.
#[async_trait]
pub trait RemoteOutput: Send {
    /// Next event, or `None` once the channel is closed.
    async fn next_event(&mut self) -> Option<RemoteEvent>;
}

/// A session channel on an authenticated connection.
#[async_trait]
pub trait SecureSession: Send {
    type Input: RemoteInput + 'static;
    type Output: RemoteOutput + 'static;

    /// Request a pseudo-terminal with the given modes and geometry.
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), SessionError>;

    /// Start the remote shell and split the channel for relaying.
    async fn start_shell(&mut self) -> Result<(Self::Input, Self::Output), SessionError>;

    /// Close the channel. Safe to call in any state.
    async fn close(&mut self);
}

/// An authenticated transport to the broker endpoint.
#[async_trait]
pub trait SecureConnection: Send {
    type Session: SecureSession;

    async fn open_session(&mut self) -> Result<Self::Session, SessionError>;

    /// Disconnect the transport.
    async fn close(&mut self);
}

/// Dials and authenticates against the broker endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: SecureConnection;

    async fn connect(&self) -> Result<Self::Connection, SessionError>;
}

/// A running broker process.
#[async_trait]
pub trait Broker: Send {
    /// Resolves when the broker exits on its own.
    async fn wait(&mut self) -> Result<ExitStatus, SessionError>;

    /// Kill the broker if still running and reap it.
    async fn terminate(&mut self);
}

/// Starts a broker for a session.
#[async_trait]
pub trait Launcher: Send + Sync {
    type Broker: Broker;

    async fn launch(&self, descriptor: &SessionDescriptor) -> Result<Self::Broker, SessionError>;
}
