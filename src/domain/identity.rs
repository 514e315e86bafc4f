//! Identity domain entity.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{EmailAddress, PasswordHash};

/// Role granted to an identity.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// Confirmation lifecycle of a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    PendingConfirmation,
    Confirmed,
}

/// Authenticated user record, as owned by the user directory.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    /// At most one live refresh token. Never part of a snapshot.
    #[serde(skip)]
    pub refresh_token: Option<String>,
    pub role: Role,
    pub is_confirmed: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create an unconfirmed identity with the default role.
    pub fn new(email: EmailAddress, password_hash: PasswordHash) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            refresh_token: None,
            role: Role::default(),
            is_confirmed: false,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set `role` of [`Identity`].
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn state(&self) -> AccountState {
        if self.is_confirmed {
            AccountState::Confirmed
        } else {
            AccountState::PendingConfirmation
        }
    }

    /// Drop the refresh token, e.g. before handing the identity out.
    pub fn redacted(mut self) -> Self {
        self.refresh_token = None;
        self
    }

    /// Whether a refresh token is currently stored.
    pub fn has_live_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_confirmed", &self.is_confirmed)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("avatar", &self.avatar)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}
