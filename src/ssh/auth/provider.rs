//! Where session credentials come from.

use crate::ssh::config;
use crate::ssh::descriptor::SessionDescriptor;

use super::AuthChain;

/// Supplies the user and credential chain for a session.
pub trait CredentialProvider: Send + Sync {
    fn user(&self, descriptor: &SessionDescriptor) -> String;

    fn credentials(&self, descriptor: &SessionDescriptor) -> AuthChain;
}

/// Credentials from `CODESPACE_SSH_USER`, `CODESPACE_SSH_PASSWORD` and
/// `CODESPACE_SSH_KEY`, falling back to the SSH agent.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    user: String,
    password: Option<String>,
    key_path: Option<String>,
}

impl EnvCredentials {
    /// Read credentials from the environment. An explicit user wins over
    /// `CODESPACE_SSH_USER`.
    pub fn resolve(user: Option<String>) -> Self {
        Self::new(
            config::resolve_ssh_user(user),
            config::resolve_ssh_password(None),
            config::resolve_ssh_key(None),
        )
    }

    pub fn new(user: String, password: Option<String>, key_path: Option<String>) -> Self {
        Self {
            user,
            password,
            key_path,
        }
    }
}

impl CredentialProvider for EnvCredentials {
    fn user(&self, _descriptor: &SessionDescriptor) -> String {
        self.user.clone()
    }

    /// Password first, then key, then the agent when neither is set.
    fn credentials(&self, _descriptor: &SessionDescriptor) -> AuthChain {
        let mut chain = AuthChain::new();

        if let Some(password) = &self.password {
            chain = chain.with_password(password.as_str());
        }

        if let Some(key_path) = &self.key_path {
            chain = chain.with_key(key_path.as_str());
        }

        if chain.is_empty() {
            chain = chain.with_agent();
        }

        chain
    }
}
