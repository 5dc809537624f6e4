//! Error taxonomy for interactive codespace sessions.
//!
//! Every stage of a session has its own variant so the CLI can tell the user
//! which step failed:
//!
//! | Stage | Variant |
//! |-------|---------|
//! | Resolving the codespace | [`SessionError::Resolve`] |
//! | Starting the broker | [`SessionError::BrokerLaunch`] |
//! | Reaching the broker / SSH handshake | [`SessionError::Dial`] |
//! | Authentication | [`SessionError::Auth`] |
//! | Opening the session channel | [`SessionError::SessionOpen`] |
//! | PTY request | [`SessionError::PtyRequest`] |
//! | Shell start | [`SessionError::ShellStart`] |
//! | Relaying bytes | [`SessionError::Relay`] |
//! | Local interrupt | [`SessionError::Interrupted`] |
//!
//! # Retry Classification
//!
//! Only the broker readiness probe is retried. Whether a dial failure is worth
//! retrying is decided from its message by [`is_retryable_error`]:
//!
//! - **Authentication failures** are never retryable, and take precedence.
//! - **Connection errors** (refused, reset, timeout, unreachable) are retryable.
//! - Anything else is retried unless it looks like an SSH protocol error.

use thiserror::Error;

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "authentication rejected",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection aborted",
    "connection timed out",
    "timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "resource temporarily unavailable",
    "broken pipe",
    "would block",
];

/// Failure of one stage of an interactive session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not resolve codespace: {0}")]
    Resolve(String),

    #[error("failed to launch connection broker: {0}")]
    BrokerLaunch(String),

    #[error("failed to reach connection broker: {0}")]
    Dial(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to open remote session: {0}")]
    SessionOpen(String),

    #[error("remote refused pseudo-terminal: {0}")]
    PtyRequest(String),

    #[error("failed to start remote shell: {0}")]
    ShellStart(String),

    #[error("session relay failed: {0}")]
    Relay(String),

    #[error("interrupted")]
    Interrupted,
}

/// Discriminant of [`SessionError`], used where only the failing stage matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolve,
    BrokerLaunch,
    Dial,
    Auth,
    SessionOpen,
    PtyRequest,
    ShellStart,
    Relay,
    Interrupted,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Resolve(_) => ErrorKind::Resolve,
            SessionError::BrokerLaunch(_) => ErrorKind::BrokerLaunch,
            SessionError::Dial(_) => ErrorKind::Dial,
            SessionError::Auth(_) => ErrorKind::Auth,
            SessionError::SessionOpen(_) => ErrorKind::SessionOpen,
            SessionError::PtyRequest(_) => ErrorKind::PtyRequest,
            SessionError::ShellStart(_) => ErrorKind::ShellStart,
            SessionError::Relay(_) => ErrorKind::Relay,
            SessionError::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Whether the readiness probe may try again after this error.
    ///
    /// Only dial failures are ever retryable; every later stage is a single
    /// attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Dial(message) => is_retryable_error(message),
            _ => false,
        }
    }

    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Classify an error message as transient (`true`) or permanent (`false`).
///
/// Authentication patterns are checked first, so a message mentioning both a
/// timeout and a rejected credential is never retried.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    if AUTH_ERRORS.iter().any(|pattern| error_lower.contains(pattern)) {
        return false;
    }

    if RETRYABLE_ERRORS
        .iter()
        .any(|pattern| error_lower.contains(pattern))
    {
        return true;
    }

    !error_lower.contains("ssh") || error_lower.contains("connect")
}
