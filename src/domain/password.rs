//! Password logic.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::invalid_field;
use crate::error::{AuthError, Result};

static PHC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\$([a-z0-9-]{1,32})(?:\$v=(\d+))?(?:\$([^$]+))?\$([^$]+)\$([^$]+)$",
    )
    .expect("PHC regex is valid")
});

/// Value object of a plaintext password.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    /// Maximum password length.
    pub const MAX_LENGTH: usize = 16;
    /// Minimum password length.
    pub const MIN_LENGTH: usize = 8;

    /// Create a new [`Password`], rejecting it before any hashing when its
    /// length is out of bounds.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let len = value.chars().count();

        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(AuthError::Validation(invalid_field(
                "password",
                "length",
                "Password must be 8 to 16 characters.",
            )));
        }

        Ok(Self(value))
    }

    /// Returns the password as raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// A hashed password in PHC string format.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Converts a [`String`] into a valid [`PasswordHash`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string is not in PHC format.
    pub fn parse(phc_string: impl Into<String>) -> Result<Self> {
        let phc = phc_string.into();
        if !PHC_RE.is_match(&phc) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Self(phc))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("phc_string", &"[REDACTED]")
            .finish()
    }
}

impl TryFrom<String> for PasswordHash {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<PasswordHash> for String {
    fn from(hash: PasswordHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_bounds() {
        assert!(Password::new("short").is_err());
        assert!(Password::new("").is_err());
        assert!(Password::new("password1").is_ok());
        assert!(Password::new("sixteen-chars-ok").is_ok());
        assert!(Password::new("seventeen-chars-x").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = Password::new("password1").unwrap();
        assert!(!format!("{password:?}").contains("password1"));
    }

    #[test]
    fn test_phc_parse() {
        assert!(PasswordHash::parse("password1").is_err());
        assert!(
            PasswordHash::parse(
                "$argon2id$v=19$m=1024,t=1,p=1$c29tZXNhbHQ$aGFzaGhhc2hoYXNo"
            )
            .is_ok()
        );
    }
}
