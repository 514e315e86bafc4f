//! Role-based authorization.
//!
//! Runs after [`AuthService::resolve_current_user`](crate::AuthService::resolve_current_user)
//! has authenticated the caller.

use std::collections::HashSet;

use crate::domain::{Identity, Role};
use crate::error::{AuthError, Result};

/// Fail with [`AuthError::Forbidden`] if `identity` has none of `allowed`.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        tracing::debug!(id = %identity.id, role = %identity.role, "access denied");
        Err(AuthError::Forbidden)
    }
}

/// Reusable set of allowed roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    roles: HashSet<Role>,
}

impl AccessPolicy {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    /// Policy granting administrators only.
    pub fn admin() -> Self {
        Self::new([Role::Admin])
    }

    pub fn authorize(&self, identity: &Identity) -> Result<()> {
        if self.roles.contains(&identity.role) {
            Ok(())
        } else {
            tracing::debug!(id = %identity.id, role = %identity.role, "access denied");
            Err(AuthError::Forbidden)
        }
    }
}
