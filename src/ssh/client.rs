//! Secure session establishment through the connection broker.
//!
//! ## Connection Lifecycle
//!
//! 1. **Readiness probe**: Dial the broker's loopback port until it accepts a
//!    TCP connection. The broker needs a moment to start listening, so refused
//!    dials are retried with exponential backoff and jitter via `backon`.
//!
//! 2. **Handshake**: Run the SSH handshake over the probed stream with a
//!    bounded timeout.
//!
//! 3. **Authentication**: Try the session's [`AuthChain`]. A rejected
//!    credential disconnects the half-built connection before returning.
//!
//! 4. **Session**: Open one session channel, request a PTY, start the shell.
//!    Both requests are sent with `want_reply` and wait for the server's
//!    answer, so a refusal is reported against the step that caused it.
//!
//! ## Retry Strategy
//!
//! Only the readiness probe retries, and only on errors classified as
//! transient by [`is_retryable_error`](super::error::is_retryable_error).
//! Authentication and later steps are single attempts.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use russh::{Channel, ChannelMsg, ChannelReadHalf, ChannelWriteHalf, Disconnect, client};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::auth::{AuthChain, AuthStrategy};
use super::config::{self, MAX_READY_DELAY};
use super::error::SessionError;
use super::handler::BrokerClientHandler;
use super::terminal::PtyRequest;
use super::transport::{
    Connector, RemoteEvent, RemoteInput, RemoteOutput, SecureConnection, SecureSession,
};

/// SSH extended data stream carrying stderr
const STDERR_STREAM: u32 = 1;

/// Timeouts and probe pacing for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectSettings {
    /// Bound on each dial, the handshake and authentication
    pub connect_timeout: Duration,
    /// Readiness probe retries after the first dial
    pub ready_retries: u32,
    /// Initial delay between readiness probes
    pub ready_delay: Duration,
    /// Bound on waiting for PTY and shell replies
    pub request_timeout: Duration,
}

impl ConnectSettings {
    pub fn from_env() -> Self {
        Self {
            connect_timeout: config::resolve_connect_timeout(None),
            ready_retries: config::resolve_ready_retries(None),
            ready_delay: config::resolve_ready_delay(None),
            request_timeout: config::resolve_request_timeout(None),
        }
    }
}

/// Build the russh client configuration for broker connections.
///
/// Interactive sessions may sit idle for a long time, so there is no
/// inactivity timeout; keepalives detect a dead broker instead.
pub(crate) fn build_client_config() -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    })
}

/// Dial `endpoint` once with a bounded timeout.
pub(crate) async fn dial(endpoint: SocketAddr, timeout: Duration) -> Result<TcpStream, SessionError> {
    tokio::time::timeout(timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| {
            SessionError::Dial(format!("dial {} timed out after {:?}", endpoint, timeout))
        })?
        .map_err(|e| SessionError::Dial(format!("dial {}: {}", endpoint, e)))
}

/// Dial `endpoint` until it accepts a connection or the retries run out.
///
/// Non-retryable dial errors stop the probe immediately. The returned error is
/// still a [`SessionError::Dial`] carrying the last failure.
pub(crate) async fn wait_for_endpoint(
    endpoint: SocketAddr,
    settings: &ConnectSettings,
) -> Result<TcpStream, SessionError> {
    let attempts = AtomicU32::new(0);

    let backoff = ExponentialBuilder::default()
        .with_min_delay(settings.ready_delay)
        .with_max_delay(MAX_READY_DELAY)
        .with_max_times(settings.ready_retries as usize)
        .with_jitter();

    let result = (|| async {
        attempts.fetch_add(1, Ordering::SeqCst);
        dial(endpoint, settings.connect_timeout).await
    })
    .retry(backoff)
    .when(|e: &SessionError| e.is_retryable())
    .notify(|e, delay| debug!("Broker not ready ({}), probing again in {:?}", e, delay))
    .await;

    let total = attempts.load(Ordering::SeqCst);
    match result {
        Ok(stream) => {
            debug!("Broker at {} accepted connection after {} probe(s)", endpoint, total);
            Ok(stream)
        }
        Err(SessionError::Dial(message)) => Err(SessionError::Dial(format!(
            "broker not accepting connections after {} attempt(s): {}",
            total, message
        ))),
        Err(e) => Err(e),
    }
}

/// Dials the broker endpoint and authenticates over it.
pub struct SshConnector {
    endpoint: SocketAddr,
    settings: ConnectSettings,
    user: String,
    credentials: AuthChain,
}

impl SshConnector {
    pub fn new(
        endpoint: SocketAddr,
        settings: ConnectSettings,
        user: impl Into<String>,
        credentials: AuthChain,
    ) -> Self {
        Self {
            endpoint,
            settings,
            user: user.into(),
            credentials,
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Connection = RusshConnection;

    async fn connect(&self) -> Result<RusshConnection, SessionError> {
        let stream = wait_for_endpoint(self.endpoint, &self.settings).await?;
        let timeout = self.settings.connect_timeout;

        let mut handle = tokio::time::timeout(
            timeout,
            client::connect_stream(build_client_config(), stream, BrokerClientHandler),
        )
        .await
        .map_err(|_| {
            SessionError::Dial(format!(
                "SSH handshake with {} timed out after {:?}",
                self.endpoint, timeout
            ))
        })?
        .map_err(|e| {
            SessionError::Dial(format!("SSH handshake with {} failed: {}", self.endpoint, e))
        })?;

        let authenticated = match tokio::time::timeout(
            timeout,
            self.credentials.authenticate(&mut handle, &self.user),
        )
        .await
        {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(SessionError::Auth(format!(
                "credentials for {} were rejected",
                self.user
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::Auth(format!(
                "no answer from server within {:?}",
                timeout
            ))),
        };

        let mut connection = RusshConnection {
            handle,
            request_timeout: self.settings.request_timeout,
        };

        if let Err(e) = authenticated {
            connection.close().await;
            return Err(e);
        }

        info!("Authenticated to {} as {}", self.endpoint, self.user);
        Ok(connection)
    }
}

/// Authenticated russh connection to the broker.
pub struct RusshConnection {
    handle: client::Handle<BrokerClientHandler>,
    request_timeout: Duration,
}

#[async_trait]
impl SecureConnection for RusshConnection {
    type Session = RusshSession;

    async fn open_session(&mut self) -> Result<RusshSession, SessionError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::SessionOpen(e.to_string()))?;

        Ok(RusshSession {
            channel: Some(channel),
            writer: None,
            pending: VecDeque::new(),
            request_timeout: self.request_timeout,
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
        {
            debug!("Disconnect from broker failed: {}", e);
        }
    }
}

/// Session channel on a [`RusshConnection`].
///
/// Before the shell starts the whole channel is held; afterwards only the
/// write half is kept, for closing.
pub struct RusshSession {
    channel: Option<Channel<client::Msg>>,
    writer: Option<Arc<ChannelWriteHalf<client::Msg>>>,
    // Output that arrived while a request reply was pending
    pending: VecDeque<RemoteEvent>,
    request_timeout: Duration,
}

impl RusshSession {
    fn unstarted_channel(&mut self) -> Option<&mut Channel<client::Msg>> {
        self.channel.as_mut()
    }
}

#[async_trait]
impl SecureSession for RusshSession {
    type Input = ChannelInput;
    type Output = ChannelOutput;

    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), SessionError> {
        let timeout = self.request_timeout;
        let mut pending = VecDeque::new();
        let channel = self
            .unstarted_channel()
            .ok_or_else(|| SessionError::PtyRequest("shell already started".to_string()))?;

        channel
            .request_pty(
                true,
                &request.term,
                request.columns,
                request.rows,
                0,
                0,
                &request.modes.to_modes(),
            )
            .await
            .map_err(|e| SessionError::PtyRequest(e.to_string()))?;

        let reply = await_reply(channel, timeout, &mut pending).await;
        self.pending.extend(pending);
        reply.map_err(SessionError::PtyRequest)?;

        debug!(
            "PTY granted: {} {}x{}",
            request.term, request.columns, request.rows
        );
        Ok(())
    }

    async fn start_shell(&mut self) -> Result<(ChannelInput, ChannelOutput), SessionError> {
        let timeout = self.request_timeout;
        let mut pending = VecDeque::new();
        let channel = self
            .unstarted_channel()
            .ok_or_else(|| SessionError::ShellStart("shell already started".to_string()))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| SessionError::ShellStart(e.to_string()))?;

        let reply = await_reply(channel, timeout, &mut pending).await;
        self.pending.extend(pending);
        reply.map_err(SessionError::ShellStart)?;

        let channel = self
            .channel
            .take()
            .ok_or_else(|| SessionError::ShellStart("shell already started".to_string()))?;
        let (reader, writer) = channel.split();
        let writer = Arc::new(writer);
        self.writer = Some(Arc::clone(&writer));

        Ok((
            ChannelInput { writer },
            ChannelOutput {
                reader,
                pending: std::mem::take(&mut self.pending),
            },
        ))
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close().await
        {
            debug!("Closing session channel failed: {}", e);
        }

        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.close().await
        {
            debug!("Closing session channel failed: {}", e);
        }
    }
}

/// Wait for the server's answer to a `want_reply` request.
///
/// Output that arrives first is queued in `pending` rather than dropped.
async fn await_reply(
    channel: &mut Channel<client::Msg>,
    timeout: Duration,
    pending: &mut VecDeque<RemoteEvent>,
) -> Result<(), String> {
    tokio::time::timeout(timeout, async {
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err("request refused by server".to_string()),
                Some(ChannelMsg::Close) | None => {
                    return Err("channel closed before reply".to_string());
                }
                Some(msg) => match remote_event(msg) {
                    Some(event) => pending.push_back(event),
                    None => continue,
                },
            }
        }
    })
    .await
    .map_err(|_| format!("no reply within {:?}", timeout))?
}

/// Translate a channel message into a relay event, if it carries one.
pub(crate) fn remote_event(msg: ChannelMsg) -> Option<RemoteEvent> {
    match msg {
        ChannelMsg::Data { data } => Some(RemoteEvent::Stdout(data.to_vec())),
        ChannelMsg::ExtendedData { data, ext } if ext == STDERR_STREAM => {
            Some(RemoteEvent::Stderr(data.to_vec()))
        }
        ChannelMsg::ExitStatus { exit_status } => Some(RemoteEvent::ExitStatus(exit_status)),
        ChannelMsg::ExitSignal { signal_name, .. } => {
            Some(RemoteEvent::ExitSignal(format!("{:?}", signal_name)))
        }
        ChannelMsg::Eof => Some(RemoteEvent::Eof),
        other => {
            debug!("Ignoring channel message {:?}", other);
            None
        }
    }
}

/// Write half handed to the relay.
pub struct ChannelInput {
    writer: Arc<ChannelWriteHalf<client::Msg>>,
}

#[async_trait]
impl RemoteInput for ChannelInput {
    async fn send(&self, data: &[u8]) -> Result<(), SessionError> {
        self.writer
            .data(data)
            .await
            .map_err(|e| SessionError::Relay(format!("write to remote failed: {}", e)))
    }

    async fn send_eof(&self) -> Result<(), SessionError> {
        self.writer
            .eof()
            .await
            .map_err(|e| SessionError::Relay(format!("sending EOF failed: {}", e)))
    }
}

/// Read half handed to the relay.
pub struct ChannelOutput {
    reader: ChannelReadHalf,
    pending: VecDeque<RemoteEvent>,
}

#[async_trait]
impl RemoteOutput for ChannelOutput {
    async fn next_event(&mut self) -> Option<RemoteEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        loop {
            match self.reader.wait().await {
                None | Some(ChannelMsg::Close) => return None,
                Some(msg) => {
                    if let Some(event) = remote_event(msg) {
                        return Some(event);
                    }
                }
            }
        }
    }
}
