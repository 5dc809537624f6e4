//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::client;

use crate::ssh::error::SessionError;
use crate::ssh::handler::BrokerClientHandler;

/// One way of authenticating a broker connection.
///
/// Implementations must be `Send + Sync` so a chain can be shared by the
/// connector across tasks.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate `user` on the connection.
    ///
    /// * `Ok(true)` - the server accepted the credential
    /// * `Ok(false)` - the server rejected it
    /// * `Err(_)` - the credential could not be tried at all
    async fn authenticate(
        &self,
        handle: &mut client::Handle<BrokerClientHandler>,
        user: &str,
    ) -> Result<bool, SessionError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
