//! russh client handler for broker connections.
//!
//! The SSH server is only ever reached through the local broker's loopback
//! port, and the broker authenticates the codespace with the access token.
//! Host keys presented through that tunnel are accepted without a known_hosts
//! lookup; the fingerprint is logged at debug level.

use russh::{client, keys};
use tracing::debug;

/// Client handler used for every broker connection.
pub struct BrokerClientHandler;

impl client::Handler for BrokerClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting codespace host key {}",
            server_public_key.fingerprint(keys::HashAlg::Sha256)
        );
        Ok(true)
    }
}
