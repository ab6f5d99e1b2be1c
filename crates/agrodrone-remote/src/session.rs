//! Current-user session from configuration
//!
//! Sign-in happens outside this workspace; the resulting user id and token
//! are handed over through `remote.user_id` / `remote.access_token` (or the
//! matching environment variables).

use agrodrone_core::config::RemoteConfig;
use agrodrone_core::domain::{DomainError, UserId};
use agrodrone_core::ports::IAuthSession;

/// Session whose user is fixed at construction time
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSession {
    user: Option<UserId>,
}

impl ConfiguredSession {
    pub fn new(user: Option<UserId>) -> Self {
        Self { user }
    }

    /// Session without a signed-in user
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `DomainError::InvalidId` if `remote.user_id` is set but blank.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, DomainError> {
        let user = config.user_id.as_deref().map(UserId::new).transpose()?;
        Ok(Self { user })
    }
}

#[async_trait::async_trait]
impl IAuthSession for ConfiguredSession {
    async fn current_user(&self) -> anyhow::Result<Option<UserId>> {
        Ok(self.user.clone())
    }
}
