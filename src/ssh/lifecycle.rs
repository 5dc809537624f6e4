//! One interactive session, from broker launch to teardown.
//!
//! Each resource is owned by the scope that acquired it and released on every
//! exit path of that scope, innermost first:
//!
//! ```text
//! launch broker ─┐
//!   connect ─────┼─┐
//!     open ──────┼─┼─┐
//!       pty, shell, relay
//!     close session ◄┘
//!   close connection ◄┘
//! terminate broker ◄┘
//! ```
//!
//! Every step that can block is raced against the cancellation token, so an
//! interrupt at any point still unwinds through the same teardown.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::descriptor::SessionDescriptor;
use super::error::SessionError;
use super::relay::{LocalStreams, RelayOutcome, relay};
use super::terminal::PtyRequest;
use super::transport::{Broker, Connector, Launcher, SecureConnection, SecureSession};

/// Run an interactive session for `descriptor` until the remote shell ends.
///
/// The broker is terminated on every path once it has been launched. A launch
/// failure leaves nothing to tear down.
pub async fn run_session<L, C, R, W, E>(
    descriptor: &SessionDescriptor,
    launcher: &L,
    connector: &C,
    pty: &PtyRequest,
    local: LocalStreams<R, W, E>,
    cancel: &CancellationToken,
) -> Result<RelayOutcome, SessionError>
where
    L: Launcher,
    C: Connector,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let mut broker = until_cancelled(cancel, launcher.launch(descriptor)).await?;

    let result = connect_and_run(&mut broker, connector, pty, local, cancel).await;

    debug!("Terminating connection broker");
    broker.terminate().await;
    result
}

async fn connect_and_run<B, C, R, W, E>(
    broker: &mut B,
    connector: &C,
    pty: &PtyRequest,
    local: LocalStreams<R, W, E>,
    cancel: &CancellationToken,
) -> Result<RelayOutcome, SessionError>
where
    B: Broker,
    C: Connector,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    // A broker that exits cleanly has detached; dialing decides readiness.
    let connecting = connector.connect();
    tokio::pin!(connecting);
    let mut broker_running = true;
    let mut connection = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Interrupted),
            exited = broker.wait(), if broker_running => {
                let status = exited?;
                if !status.success() {
                    return Err(SessionError::BrokerLaunch(format!(
                        "broker exited before accepting connections ({})",
                        status
                    )));
                }
                debug!("Connection broker detached: {}", status);
                broker_running = false;
            }
            connection = &mut connecting => break connection?,
        }
    };
    info!("Connected to codespace");

    let result = open_and_run(&mut connection, pty, local, cancel).await;

    debug!("Closing connection");
    connection.close().await;
    result
}

async fn open_and_run<S, R, W, E>(
    connection: &mut S,
    pty: &PtyRequest,
    local: LocalStreams<R, W, E>,
    cancel: &CancellationToken,
) -> Result<RelayOutcome, SessionError>
where
    S: SecureConnection,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let mut session = until_cancelled(cancel, connection.open_session()).await?;

    let result = run_shell(&mut session, pty, local, cancel).await;

    debug!("Closing session");
    session.close().await;
    result
}

async fn run_shell<S, R, W, E>(
    session: &mut S,
    pty: &PtyRequest,
    local: LocalStreams<R, W, E>,
    cancel: &CancellationToken,
) -> Result<RelayOutcome, SessionError>
where
    S: SecureSession,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    until_cancelled(cancel, session.request_pty(pty)).await?;
    let (input, output) = until_cancelled(cancel, session.start_shell()).await?;
    info!(term = %pty.term, cols = pty.columns, rows = pty.rows, "Remote shell started");

    relay(input, output, local, cancel).await
}

async fn until_cancelled<T, F>(cancel: &CancellationToken, step: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Interrupted),
        result = step => result,
    }
}
