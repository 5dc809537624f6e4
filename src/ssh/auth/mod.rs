//! Credentials for the SSH handshake with a codespace.
//!
//! Each way of proving identity is an [`AuthStrategy`]; an [`AuthChain`]
//! tries them in order. Where the credentials come from is a separate
//! concern behind [`CredentialProvider`], so the session code never hardcodes
//! a password.
//!
//! # Available Strategies
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Private key file authentication
//! - [`AgentAuth`]: SSH agent authentication

mod agent;
mod chain;
mod key;
mod password;
mod provider;
mod traits;

pub use agent::AgentAuth;
pub use chain::AuthChain;
pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use provider::{CredentialProvider, EnvCredentials};
pub use traits::AuthStrategy;
