//! Email logic management.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::invalid_field;
use crate::error::{AuthError, Result};

/// Value object of a valid email address.
///
/// Stored lowercased, it is the unique key of an identity and the key of its
/// cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Converts a [`String`] into a valid [`EmailAddress`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string does not hold exactly one `@` with a
    /// non-empty local part and domain.
    pub fn parse(email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        let email = email.trim();

        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@') =>
            {
                Ok(Self(email.to_lowercase()))
            },
            _ => Err(AuthError::Validation(invalid_field(
                "email",
                "email",
                "Invalid email.",
            ))),
        }
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let email = EmailAddress::parse("  A@X.com ").unwrap();
        assert_eq!(email.as_str(), "a@x.com");
    }

    #[test]
    fn test_parse_rejects() {
        for raw in ["", "ax.com", "@x.com", "a@", "a@b@c"] {
            let err = EmailAddress::parse(raw).unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{raw}");
        }
    }
}
