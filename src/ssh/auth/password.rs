//! Password authentication.

use std::fmt;

use async_trait::async_trait;
use russh::client;

use crate::ssh::error::SessionError;
use crate::ssh::handler::BrokerClientHandler;

use super::traits::AuthStrategy;

/// Authenticates with a fixed password.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordAuth(<redacted>)")
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<BrokerClientHandler>,
        user: &str,
    ) -> Result<bool, SessionError> {
        let result = handle
            .authenticate_password(user, &self.password)
            .await
            .map_err(|e| SessionError::Auth(format!("password exchange failed: {}", e)))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "password"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_auth_name() {
        assert_eq!(PasswordAuth::new("secret").name(), "password");
    }

    #[test]
    fn test_password_not_in_debug() {
        let auth = PasswordAuth::new("hunter2");
        assert!(!format!("{:?}", auth).contains("hunter2"));
    }
}
