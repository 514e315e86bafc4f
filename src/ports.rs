//! These traits define what the service needs from the outside world.
//!
//! Every call may suspend. Callers can bound any operation with
//! `tokio::time::timeout`; dropping the future cancels the pending call.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{EmailAddress, Identity, PasswordHash};
use crate::error::Result;

/// Port for identity persistence.
///
/// Mutators commit before returning. Updates to a single identity are
/// expected to be serialized by the implementation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create an unconfirmed identity.
    ///
    /// Fails with [`AuthError::Conflict`](crate::AuthError::Conflict) when
    /// the email is already registered.
    async fn create_user(
        &self,
        email: &EmailAddress,
        password_hash: &PasswordHash,
    ) -> Result<Identity>;

    async fn get_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Identity>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Overwrite or clear the stored refresh token.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>)
    -> Result<()>;

    /// Atomically replace the stored refresh token if it still equals
    /// `expected`. Returns `false` when nothing was written.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: Option<&str>,
    ) -> Result<bool>;

    async fn set_confirmed(&self, id: Uuid) -> Result<()>;

    async fn set_password(&self, id: Uuid, hash: &PasswordHash) -> Result<()>;

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<()>;
}

/// Port for a key-value cache with per-key atomic operations.
#[async_trait]
pub trait CachePort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Make `key` disappear after `seconds`.
    async fn expire(&self, key: &str, seconds: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Kind of email-action message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ConfirmEmail,
    ResetPassword,
}

impl NotificationKind {
    /// Path appended to the base URL, followed by the token.
    pub fn path(&self) -> &'static str {
        match self {
            NotificationKind::ConfirmEmail => "api/auth/confirm-email",
            NotificationKind::ResetPassword => "api/auth/reset-password",
        }
    }

    /// Build the link a user follows to complete the action.
    pub fn link(&self, base_url: &str, token: &str) -> String {
        format!("{}/{}/{token}", base_url.trim_end_matches('/'), self.path())
    }
}

/// Port for sending email-action notifications.
///
/// Delivery is best-effort: errors are logged by the caller and never
/// propagated.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        kind: NotificationKind,
        email: &EmailAddress,
        token: &str,
        base_url: &str,
    ) -> Result<()>;
}

/// Port for getting the current time.
pub trait Clock: Send + Sync {
    /// Get the current Unix timestamp in seconds.
    fn now(&self) -> u64;
}
