//! SSH agent authentication.

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::ssh::error::SessionError;
use crate::ssh::handler::BrokerClientHandler;

use super::traits::AuthStrategy;

/// Offers every identity held by the agent at `SSH_AUTH_SOCK`.
#[derive(Debug, Default)]
pub struct AgentAuth;

#[async_trait]
impl AuthStrategy for AgentAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<BrokerClientHandler>,
        user: &str,
    ) -> Result<bool, SessionError> {
        let mut agent = keys::agent::client::AgentClient::connect_env()
            .await
            .map_err(|e| SessionError::Auth(format!("no SSH agent available: {}", e)))?;

        let identities = agent
            .request_identities()
            .await
            .map_err(|e| SessionError::Auth(format!("SSH agent listing failed: {}", e)))?;

        if identities.is_empty() {
            return Err(SessionError::Auth("SSH agent holds no identities".to_string()));
        }

        for identity in identities {
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();

            match handle
                .authenticate_publickey_with(user, identity.clone(), hash_alg, &mut agent)
                .await
            {
                Ok(result) if result.success() => return Ok(true),
                Ok(_) => debug!("Agent identity {:?} rejected", identity.comment()),
                Err(e) => debug!("Agent identity {:?} failed: {}", identity.comment(), e),
            }
        }

        Ok(false)
    }

    fn name(&self) -> &'static str {
        "agent"
    }
}
