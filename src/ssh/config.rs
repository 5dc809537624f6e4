//! Configuration resolution for codespace sessions.
//!
//! Values follow a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from the process environment (or `.env`)
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CODESPACE_BROKER_PROGRAM` | `node` | Broker executable |
//! | `CODESPACE_BROKER_SCRIPT` | `app.js` | Script handed to the broker |
//! | `CODESPACE_BROKER_PORT` | 2222 | Loopback port the broker listens on |
//! | `CODESPACE_SSH_USER` | `codespace` | SSH user name |
//! | `CODESPACE_SSH_PASSWORD` | unset | Password credential |
//! | `CODESPACE_SSH_KEY` | unset | Private key credential |
//! | `CODESPACE_CONNECT_TIMEOUT` | 10s | Dial and handshake timeout |
//! | `CODESPACE_READY_RETRIES` | 10 | Broker readiness probe retries |
//! | `CODESPACE_READY_DELAY_MS` | 250ms | Initial readiness probe delay |
//! | `CODESPACE_REQUEST_TIMEOUT` | 15s | PTY and shell reply timeout |
//! | `CODESPACE_TERM` | `xterm` | Remote terminal type |
//! | `COLUMNS` / `LINES` | 80 / 40 | Remote terminal geometry |

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub(crate) const DEFAULT_BROKER_PROGRAM: &str = "node";
pub(crate) const DEFAULT_BROKER_SCRIPT: &str = "app.js";
pub(crate) const DEFAULT_BROKER_PORT: u16 = 2222;
pub(crate) const DEFAULT_SSH_USER: &str = "codespace";
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_READY_RETRIES: u32 = 10;
pub(crate) const DEFAULT_READY_DELAY_MS: u64 = 250;
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub(crate) const DEFAULT_TERM: &str = "xterm";
pub(crate) const DEFAULT_COLUMNS: u32 = 80;
pub(crate) const DEFAULT_ROWS: u32 = 40;

/// Maximum delay between readiness probes
pub(crate) const MAX_READY_DELAY: Duration = Duration::from_secs(2);

pub(crate) const BROKER_PROGRAM_ENV_VAR: &str = "CODESPACE_BROKER_PROGRAM";
pub(crate) const BROKER_SCRIPT_ENV_VAR: &str = "CODESPACE_BROKER_SCRIPT";
pub(crate) const BROKER_PORT_ENV_VAR: &str = "CODESPACE_BROKER_PORT";
pub(crate) const SSH_USER_ENV_VAR: &str = "CODESPACE_SSH_USER";
pub(crate) const SSH_PASSWORD_ENV_VAR: &str = "CODESPACE_SSH_PASSWORD";
pub(crate) const SSH_KEY_ENV_VAR: &str = "CODESPACE_SSH_KEY";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "CODESPACE_CONNECT_TIMEOUT";
pub(crate) const READY_RETRIES_ENV_VAR: &str = "CODESPACE_READY_RETRIES";
pub(crate) const READY_DELAY_MS_ENV_VAR: &str = "CODESPACE_READY_DELAY_MS";
pub(crate) const REQUEST_TIMEOUT_ENV_VAR: &str = "CODESPACE_REQUEST_TIMEOUT";
pub(crate) const TERM_ENV_VAR: &str = "CODESPACE_TERM";
pub(crate) const COLUMNS_ENV_VAR: &str = "COLUMNS";
pub(crate) const ROWS_ENV_VAR: &str = "LINES";

/// Resolve a parsed value with priority: parameter -> env var -> default.
///
/// Unparseable environment values fall through to the default.
fn resolve<T: FromStr>(param: Option<T>, env_var: &str, default: T) -> T {
    if let Some(value) = param {
        return value;
    }

    if let Ok(raw) = env::var(env_var)
        && let Ok(value) = raw.trim().parse::<T>()
    {
        return value;
    }

    default
}

/// Resolve an optional string with priority: parameter -> env var.
///
/// Empty environment values count as unset.
fn resolve_optional(param: Option<String>, env_var: &str) -> Option<String> {
    param.or_else(|| env::var(env_var).ok().filter(|value| !value.is_empty()))
}

pub(crate) fn resolve_broker_program(param: Option<String>) -> String {
    resolve(param, BROKER_PROGRAM_ENV_VAR, DEFAULT_BROKER_PROGRAM.to_string())
}

pub(crate) fn resolve_broker_script(param: Option<String>) -> String {
    resolve(param, BROKER_SCRIPT_ENV_VAR, DEFAULT_BROKER_SCRIPT.to_string())
}

pub(crate) fn resolve_broker_port(param: Option<u16>) -> u16 {
    resolve(param, BROKER_PORT_ENV_VAR, DEFAULT_BROKER_PORT)
}

pub(crate) fn resolve_ssh_user(param: Option<String>) -> String {
    resolve(param, SSH_USER_ENV_VAR, DEFAULT_SSH_USER.to_string())
}

pub(crate) fn resolve_ssh_password(param: Option<String>) -> Option<String> {
    resolve_optional(param, SSH_PASSWORD_ENV_VAR)
}

pub(crate) fn resolve_ssh_key(param: Option<String>) -> Option<String> {
    resolve_optional(param, SSH_KEY_ENV_VAR)
}

pub(crate) fn resolve_connect_timeout(param: Option<u64>) -> Duration {
    Duration::from_secs(resolve(
        param,
        CONNECT_TIMEOUT_ENV_VAR,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    ))
}

pub(crate) fn resolve_ready_retries(param: Option<u32>) -> u32 {
    resolve(param, READY_RETRIES_ENV_VAR, DEFAULT_READY_RETRIES)
}

pub(crate) fn resolve_ready_delay(param: Option<u64>) -> Duration {
    Duration::from_millis(resolve(param, READY_DELAY_MS_ENV_VAR, DEFAULT_READY_DELAY_MS))
}

pub(crate) fn resolve_request_timeout(param: Option<u64>) -> Duration {
    Duration::from_secs(resolve(
        param,
        REQUEST_TIMEOUT_ENV_VAR,
        DEFAULT_REQUEST_TIMEOUT_SECS,
    ))
}

pub(crate) fn resolve_term(param: Option<String>) -> String {
    resolve(param, TERM_ENV_VAR, DEFAULT_TERM.to_string())
}

/// Resolve the PTY geometry as `(columns, rows)`.
///
/// Zero is not a usable size and falls back to the default.
pub(crate) fn resolve_geometry(columns: Option<u32>, rows: Option<u32>) -> (u32, u32) {
    let columns = resolve(columns, COLUMNS_ENV_VAR, DEFAULT_COLUMNS);
    let rows = resolve(rows, ROWS_ENV_VAR, DEFAULT_ROWS);
    (
        if columns == 0 { DEFAULT_COLUMNS } else { columns },
        if rows == 0 { DEFAULT_ROWS } else { rows },
    )
}
