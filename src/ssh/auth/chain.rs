//! Ordered fallback across authentication strategies.

use std::path::PathBuf;

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::ssh::error::SessionError;
use crate::ssh::handler::BrokerClientHandler;

use super::traits::AuthStrategy;
use super::{AgentAuth, KeyAuth, PasswordAuth};

/// Tries strategies in insertion order until one is accepted.
///
/// ```ignore
/// let chain = AuthChain::new()
///     .with_password("secret")
///     .with_agent();
/// chain.authenticate(&mut handle, "codespace").await?;
/// ```
#[derive(Default)]
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.with_strategy(PasswordAuth::new(password))
    }

    pub fn with_key(self, key_path: impl Into<PathBuf>) -> Self {
        self.with_strategy(KeyAuth::new(key_path))
    }

    pub fn with_agent(self) -> Self {
        self.with_strategy(AgentAuth)
    }

    /// Append any strategy, including ones defined outside this crate.
    pub fn with_strategy(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Strategy names in the order they will be tried.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<BrokerClientHandler>,
        user: &str,
    ) -> Result<bool, SessionError> {
        if self.strategies.is_empty() {
            return Err(SessionError::Auth(
                "no authentication strategies configured".to_string(),
            ));
        }

        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying {} authentication", strategy.name());

            match strategy.authenticate(handle, user).await {
                Ok(true) => {
                    debug!("{} authentication accepted", strategy.name());
                    return Ok(true);
                }
                Ok(false) => {
                    last_error = Some(SessionError::Auth(format!(
                        "{} authentication rejected for {}",
                        strategy.name(),
                        user
                    )));
                }
                Err(e) => {
                    debug!("{} authentication unavailable: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SessionError::Auth("all authentication methods failed".to_string())
        }))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain() {
        let chain = AuthChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_chain_preserves_order() {
        let chain = AuthChain::new()
            .with_key("/k1")
            .with_password("p1")
            .with_agent();
        assert_eq!(chain.names(), vec!["key", "password", "agent"]);
    }

    #[test]
    fn test_custom_strategy() {
        struct Token;

        #[async_trait]
        impl AuthStrategy for Token {
            async fn authenticate(
                &self,
                _handle: &mut client::Handle<BrokerClientHandler>,
                _user: &str,
            ) -> Result<bool, SessionError> {
                Ok(false)
            }

            fn name(&self) -> &'static str {
                "token"
            }
        }

        let chain = AuthChain::new().with_strategy(Token).with_agent();
        assert_eq!(chain.names(), vec!["token", "agent"]);
    }

    #[test]
    fn test_chain_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthChain>();
    }
}
