//! Session descriptors and the resolver that produces them.
//!
//! A [`SessionDescriptor`] carries everything the broker needs to reach one
//! codespace. It is resolved once per session and never persisted.

use std::env;
use std::fmt;

use async_trait::async_trait;

use super::error::SessionError;

/// Environment variable holding the codespace access token
pub(crate) const TOKEN_ENV_VAR: &str = "CODESPACES_TOKEN";

/// Environment variable holding the remote workspace session id
pub(crate) const SESSION_ID_ENV_VAR: &str = "CODESPACES_SESSION_ID";

/// Immutable connection target for one interactive session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    codespace: String,
    workspace_id: String,
    token: String,
}

impl SessionDescriptor {
    pub fn new(
        codespace: impl Into<String>,
        workspace_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            codespace: codespace.into(),
            workspace_id: workspace_id.into(),
            token: token.into(),
        }
    }

    pub fn codespace(&self) -> &str {
        &self.codespace
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// The token must never reach logs.
impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("codespace", &self.codespace)
            .field("workspace_id", &self.workspace_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Turns a codespace name into a [`SessionDescriptor`].
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, codespace: &str) -> Result<SessionDescriptor, SessionError>;
}

/// Resolver reading the token and workspace id from the environment.
///
/// Stands in for the REST lookup performed by the rest of the CLI.
#[derive(Debug, Default)]
pub struct EnvResolver;

#[async_trait]
impl SessionResolver for EnvResolver {
    async fn resolve(&self, codespace: &str) -> Result<SessionDescriptor, SessionError> {
        if codespace.trim().is_empty() {
            return Err(SessionError::Resolve(
                "codespace name must not be empty".to_string(),
            ));
        }

        let token = required_env(TOKEN_ENV_VAR)?;
        let workspace_id = required_env(SESSION_ID_ENV_VAR)?;

        Ok(SessionDescriptor::new(codespace, workspace_id, token))
    }
}

fn required_env(name: &str) -> Result<String, SessionError> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SessionError::Resolve(format!("{} is not set", name)))
}
