//! Interactive SSH sessions into a codespace through a local connection broker.
//!
//! This module is organized into the following submodules:
//!
//! - `descriptor`: Session descriptor and the resolver that produces it
//! - `config`: Configuration resolution with environment variable support
//! - `error`: Session error taxonomy and retry classification
//! - `broker`: Launching and reaping the connection broker process
//! - `auth`: Pluggable SSH credentials
//! - `client`: Dialing, authenticating and driving the SSH channel
//! - `terminal`: Pseudo-terminal request and modes
//! - `relay`: Bidirectional stream relay between local and remote
//! - `lifecycle`: One session end to end, with ordered teardown

pub mod auth;
pub mod broker;
pub mod client;
pub(crate) mod config;
pub mod descriptor;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod relay;
pub mod terminal;
#[cfg(all(test, unix))]
pub(crate) mod testing;
pub mod transport;

pub use broker::{BrokerConfig, BrokerLauncher};
pub use client::{ConnectSettings, SshConnector};
pub use descriptor::{EnvResolver, SessionDescriptor, SessionResolver};
pub use error::{ErrorKind, SessionError};
pub use lifecycle::run_session;
pub use relay::{LocalStreams, RelayOutcome};
pub use terminal::{PtyRequest, TerminalModes};
