//! In-memory stand-ins for the broker and SSH transport, used by tests.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::descriptor::SessionDescriptor;
use super::error::SessionError;
use super::terminal::PtyRequest;
use super::transport::{
    Broker, Connector, Launcher, RemoteEvent, RemoteInput, RemoteOutput, SecureConnection,
    SecureSession,
};

/// What the fake remote shell does once started.
#[derive(Debug, Clone)]
pub(crate) enum RemoteScript {
    /// Echo input to stdout; on EOF write "bye" to stderr and exit 0.
    Echo,
    /// Send these events, then close.
    Events(Vec<RemoteEvent>),
    /// Stay open and quiet until hung up.
    Silent,
    /// Refuse all input, send these events shortly after, then stay open
    /// until hung up.
    RejectInput(Vec<RemoteEvent>),
}

#[derive(Debug)]
pub(crate) enum Inbound {
    Data(Vec<u8>),
    Eof,
}

pub(crate) struct FakeInput {
    tx: mpsc::UnboundedSender<Inbound>,
}

#[async_trait]
impl RemoteInput for FakeInput {
    async fn send(&self, data: &[u8]) -> Result<(), SessionError> {
        self.tx
            .send(Inbound::Data(data.to_vec()))
            .map_err(|_| SessionError::Relay("remote input closed".to_string()))
    }

    async fn send_eof(&self) -> Result<(), SessionError> {
        self.tx
            .send(Inbound::Eof)
            .map_err(|_| SessionError::Relay("remote input closed".to_string()))
    }
}

pub(crate) struct FakeOutput {
    rx: mpsc::UnboundedReceiver<RemoteEvent>,
}

#[async_trait]
impl RemoteOutput for FakeOutput {
    async fn next_event(&mut self) -> Option<RemoteEvent> {
        self.rx.recv().await
    }
}

/// A started fake shell. Cancelling `hangup` closes the remote side.
pub(crate) struct FakeRemote {
    pub input: FakeInput,
    pub output: FakeOutput,
    pub hangup: CancellationToken,
}

impl FakeRemote {
    pub fn start(script: RemoteScript) -> Self {
        let (in_tx, mut in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let hangup = CancellationToken::new();

        if matches!(script, RemoteScript::RejectInput(_)) {
            in_rx.close();
        }

        let stop = hangup.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = play(script, &mut in_rx, &out_tx) => {}
            }
            // out_tx drops here, closing the output side
        });

        Self {
            input: FakeInput { tx: in_tx },
            output: FakeOutput { rx: out_rx },
            hangup,
        }
    }
}

async fn play(
    script: RemoteScript,
    inbound: &mut mpsc::UnboundedReceiver<Inbound>,
    outbound: &mpsc::UnboundedSender<RemoteEvent>,
) {
    match script {
        RemoteScript::Echo => {
            while let Some(msg) = inbound.recv().await {
                match msg {
                    Inbound::Data(data) => {
                        let _ = outbound.send(RemoteEvent::Stdout(data));
                    }
                    Inbound::Eof => {
                        let _ = outbound.send(RemoteEvent::Stderr(b"bye\n".to_vec()));
                        let _ = outbound.send(RemoteEvent::ExitStatus(0));
                        let _ = outbound.send(RemoteEvent::Eof);
                        return;
                    }
                }
            }
        }
        RemoteScript::Events(events) => {
            for event in events {
                let _ = outbound.send(event);
            }
        }
        RemoteScript::RejectInput(events) => {
            tokio::time::sleep(Duration::from_millis(50)).await;
            for event in events {
                let _ = outbound.send(event);
            }
            std::future::pending().await
        }
        RemoteScript::Silent => std::future::pending().await,
    }
}

/// Ordered record of every lifecycle call the fakes saw.
#[derive(Debug, Default)]
pub(crate) struct Record {
    pub calls: Vec<&'static str>,
    pub launched: Option<SessionDescriptor>,
    pub pty: Option<PtyRequest>,
}

pub(crate) type Journal = Arc<Mutex<Record>>;

fn note(journal: &Journal, call: &'static str) {
    if let Ok(mut record) = journal.lock() {
        record.calls.push(call);
    }
}

/// Step at which a scenario fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailAt {
    Nowhere,
    Launch,
    Dial,
    Auth,
    Open,
    Pty,
    Shell,
}

/// Behaviour of one fake session, from broker launch to remote shell.
#[derive(Debug, Clone)]
pub(crate) struct Scenario {
    pub fail_at: FailAt,
    /// Broker exits on its own with this code before anything connects.
    pub broker_exits: Option<i32>,
    /// Connector never completes.
    pub connect_hangs: bool,
    pub script: RemoteScript,
    pub journal: Journal,
}

impl Scenario {
    pub fn new(script: RemoteScript) -> Self {
        Self {
            fail_at: FailAt::Nowhere,
            broker_exits: None,
            connect_hangs: false,
            script,
            journal: Journal::default(),
        }
    }

    pub fn failing_at(mut self, step: FailAt) -> Self {
        self.fail_at = step;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.journal
            .lock()
            .map(|record| record.calls.clone())
            .unwrap_or_default()
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher(self.clone())
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector(self.clone())
    }
}

pub(crate) struct FakeLauncher(Scenario);

#[async_trait]
impl Launcher for FakeLauncher {
    type Broker = FakeBroker;

    async fn launch(&self, descriptor: &SessionDescriptor) -> Result<FakeBroker, SessionError> {
        note(&self.0.journal, "launch");
        if let Ok(mut record) = self.0.journal.lock() {
            record.launched = Some(descriptor.clone());
        }
        if self.0.fail_at == FailAt::Launch {
            return Err(SessionError::BrokerLaunch("node: not found".to_string()));
        }
        Ok(FakeBroker(self.0.clone()))
    }
}

pub(crate) struct FakeBroker(Scenario);

#[async_trait]
impl Broker for FakeBroker {
    async fn wait(&mut self) -> Result<ExitStatus, SessionError> {
        if let Some(code) = self.0.broker_exits {
            note(&self.0.journal, "broker.exited");
            return Ok(ExitStatus::from_raw(code << 8));
        }
        std::future::pending().await
    }

    async fn terminate(&mut self) {
        note(&self.0.journal, "broker.terminate");
    }
}

pub(crate) struct FakeConnector(Scenario);

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, SessionError> {
        note(&self.0.journal, "connect");
        if self.0.connect_hangs {
            std::future::pending::<()>().await;
        }
        match self.0.fail_at {
            FailAt::Dial => Err(SessionError::Dial("connection refused".to_string())),
            FailAt::Auth => Err(SessionError::Auth(
                "password authentication rejected for codespace".to_string(),
            )),
            _ => Ok(FakeConnection(self.0.clone())),
        }
    }
}

pub(crate) struct FakeConnection(Scenario);

#[async_trait]
impl SecureConnection for FakeConnection {
    type Session = FakeSession;

    async fn open_session(&mut self) -> Result<FakeSession, SessionError> {
        note(&self.0.journal, "open_session");
        if self.0.fail_at == FailAt::Open {
            return Err(SessionError::SessionOpen("channel refused".to_string()));
        }
        Ok(FakeSession {
            scenario: self.0.clone(),
            hangup: None,
        })
    }

    async fn close(&mut self) {
        note(&self.0.journal, "connection.close");
    }
}

pub(crate) struct FakeSession {
    scenario: Scenario,
    hangup: Option<CancellationToken>,
}

#[async_trait]
impl SecureSession for FakeSession {
    type Input = FakeInput;
    type Output = FakeOutput;

    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), SessionError> {
        note(&self.scenario.journal, "request_pty");
        if let Ok(mut record) = self.scenario.journal.lock() {
            record.pty = Some(request.clone());
        }
        if self.scenario.fail_at == FailAt::Pty {
            return Err(SessionError::PtyRequest("pty-req denied".to_string()));
        }
        Ok(())
    }

    async fn start_shell(&mut self) -> Result<(FakeInput, FakeOutput), SessionError> {
        note(&self.scenario.journal, "start_shell");
        if self.scenario.fail_at == FailAt::Shell {
            return Err(SessionError::ShellStart("shell denied".to_string()));
        }
        let remote = FakeRemote::start(self.scenario.script.clone());
        self.hangup = Some(remote.hangup);
        Ok((remote.input, remote.output))
    }

    async fn close(&mut self) {
        note(&self.scenario.journal, "session.close");
        if let Some(hangup) = self.hangup.take() {
            hangup.cancel();
        }
    }
}
