//! Bidirectional relay between the local terminal and a remote shell.
//!
//! Two tasks run for the life of the session:
//!
//! - **upstream**: local input -> remote input. Local EOF is forwarded as a
//!   channel EOF and the task ends; the remote side decides when the session
//!   is over.
//! - **downstream**: remote stdout/stderr -> local stdout/stderr, until the
//!   channel closes. Exit status and exit signal are recorded on the way.
//!
//! Both tasks watch a child of the session's cancellation token. The token is
//! cancelled when downstream finishes or fails, or when the session is
//! interrupted, so neither direction can outlive the other. If upstream fails
//! first, downstream gets a short window to drain what the remote already sent.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Stderr, Stdin, Stdout};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::SessionError;
use super::transport::{RemoteEvent, RemoteInput, RemoteOutput};

/// Read size for local input
const RELAY_BUFFER_SIZE: usize = 8192;

/// How long remote output may keep draining after local input failed
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// The three local streams a session is bound to.
pub struct LocalStreams<R, W, E> {
    pub input: R,
    pub output: W,
    pub error: E,
}

impl LocalStreams<Stdin, Stdout, Stderr> {
    /// The process's own standard streams.
    pub fn stdio() -> Self {
        Self {
            input: tokio::io::stdin(),
            output: tokio::io::stdout(),
            error: tokio::io::stderr(),
        }
    }
}

/// How the remote shell ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    pub exit_status: Option<u32>,
    pub exit_signal: Option<String>,
}

impl RelayOutcome {
    /// Process exit code mirroring the remote shell.
    ///
    /// Statuses that do not fit a process exit code count as failure.
    pub fn exit_code(&self) -> i32 {
        if let Some(signal) = &self.exit_signal {
            warn!("Remote shell killed by signal {}", signal);
            return 1;
        }
        match self.exit_status {
            Some(status) => u8::try_from(status).map(i32::from).unwrap_or(1),
            None => 1,
        }
    }

    fn is_reported(&self) -> bool {
        self.exit_status.is_some() || self.exit_signal.is_some()
    }
}

/// Relay between `local` and a started remote shell until the shell ends.
///
/// Returns [`SessionError::Interrupted`] if `cancel` fires first, or the
/// first I/O error from either direction. A channel that closes without an
/// exit status or signal is a [`SessionError::Relay`].
pub async fn relay<I, O, R, W, E>(
    input: I,
    output: O,
    local: LocalStreams<R, W, E>,
    cancel: &CancellationToken,
) -> Result<RelayOutcome, SessionError>
where
    I: RemoteInput + 'static,
    O: RemoteOutput + 'static,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let stop = cancel.child_token();
    let input_failed = CancellationToken::new();
    let LocalStreams {
        input: local_in,
        output: local_out,
        error: local_err,
    } = local;

    let upstream = tokio::spawn(forward_input(
        local_in,
        input,
        stop.clone(),
        input_failed.clone(),
    ));
    let mut downstream =
        tokio::spawn(forward_output(output, local_out, local_err, stop.clone()));

    let downstream = tokio::select! {
        biased;
        finished = &mut downstream => finished,
        _ = input_failed.cancelled() => {
            // The remote may already have queued its exit status
            match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut downstream).await {
                Ok(finished) => finished,
                Err(_) => {
                    stop.cancel();
                    downstream.await
                }
            }
        }
    };
    stop.cancel();

    let downstream = flatten(downstream);
    let upstream = flatten(upstream.await);

    match (downstream, upstream) {
        (Err(e), _) => Err(e),
        (Ok(Some(outcome)), _) if outcome.is_reported() => Ok(outcome),
        (Ok(_), Err(e)) => Err(e),
        (Ok(Some(_)), Ok(())) => Err(SessionError::Relay(
            "remote session ended without an exit status".to_string(),
        )),
        (Ok(None), Ok(())) => Err(SessionError::Interrupted),
    }
}

fn flatten<T>(joined: Result<Result<T, SessionError>, JoinError>) -> Result<T, SessionError> {
    joined.map_err(|e| SessionError::Relay(format!("relay task failed: {}", e)))?
}

/// Upstream task. Returns `Ok` when stopped or after forwarding local EOF.
///
/// A failure is flagged on `failed` instead of stopping downstream, so output
/// already sent by the remote still reaches the local streams.
async fn forward_input<R, I>(
    local: R,
    remote: I,
    stop: CancellationToken,
    failed: CancellationToken,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    I: RemoteInput,
{
    let result = tokio::select! {
        _ = stop.cancelled() => Ok(()),
        result = pump_input(local, &remote) => result,
    };

    if let Err(e) = &result {
        debug!("Local input relay stopped: {}", e);
        failed.cancel();
    }
    result
}

async fn pump_input<R, I>(mut local: R, remote: &I) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    I: RemoteInput,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];

    loop {
        let n = local
            .read(&mut buf)
            .await
            .map_err(|e| SessionError::Relay(format!("reading local input: {}", e)))?;

        if n == 0 {
            debug!("Local input closed, sending EOF");
            return remote.send_eof().await;
        }

        remote.send(&buf[..n]).await?;
    }
}

/// Downstream task. Returns `Ok(None)` when stopped before the channel closed.
async fn forward_output<O, W, E>(
    mut remote: O,
    mut stdout: W,
    mut stderr: E,
    stop: CancellationToken,
) -> Result<Option<RelayOutcome>, SessionError>
where
    O: RemoteOutput,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut outcome = RelayOutcome::default();

    loop {
        let event = tokio::select! {
            biased;
            event = remote.next_event() => event,
            _ = stop.cancelled() => return Ok(None),
        };

        let written = match event {
            None => break,
            Some(RemoteEvent::Stdout(data)) => write_local(&mut stdout, &data).await,
            Some(RemoteEvent::Stderr(data)) => write_local(&mut stderr, &data).await,
            Some(RemoteEvent::ExitStatus(status)) => {
                debug!("Remote shell exited with status {}", status);
                outcome.exit_status = Some(status);
                Ok(())
            }
            Some(RemoteEvent::ExitSignal(signal)) => {
                outcome.exit_signal = Some(signal);
                Ok(())
            }
            Some(RemoteEvent::Eof) => {
                // The exit status may still follow the EOF
                if outcome.exit_status.is_some() {
                    break;
                }
                Ok(())
            }
        };

        if let Err(e) = written {
            stop.cancel();
            return Err(e);
        }
    }

    Ok(Some(outcome))
}

async fn write_local<W: AsyncWrite + Unpin>(local: &mut W, data: &[u8]) -> Result<(), SessionError> {
    local.write_all(data).await.map_err(write_failed)?;
    local.flush().await.map_err(write_failed)
}

fn write_failed(e: std::io::Error) -> SessionError {
    SessionError::Relay(format!("writing local output: {}", e))
}
