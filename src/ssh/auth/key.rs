//! Private key file authentication.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::ssh::error::SessionError;
use crate::ssh::handler::BrokerClientHandler;

use super::traits::AuthStrategy;

/// Authenticates with an unencrypted private key loaded from disk.
#[derive(Debug)]
pub struct KeyAuth {
    key_path: PathBuf,
}

impl KeyAuth {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<BrokerClientHandler>,
        user: &str,
    ) -> Result<bool, SessionError> {
        let key_pair = keys::load_secret_key(&self.key_path, None).map_err(|e| {
            SessionError::Auth(format!(
                "could not load private key {}: {}",
                self.key_path.display(),
                e
            ))
        })?;

        // RSA keys need the strongest hash both sides support
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Key auth with RSA hash {:?}", hash_alg);

        let key = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);
        let result = handle
            .authenticate_publickey(user, key)
            .await
            .map_err(|e| SessionError::Auth(format!("public key exchange failed: {}", e)))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
