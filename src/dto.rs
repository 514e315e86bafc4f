//! Input bodies accepted by the service.
//!
//! Fields are checked with `validator` before any hashing or lookup happens.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{EmailAddress, Password};
use crate::error::Result;

/// Email and password pair, used by signup and signin.
#[derive(Clone, Validate, Serialize, Deserialize)]
pub struct Credentials {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 16,
        message = "Password must be 8 to 16 characters."
    ))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Validate then convert into value objects.
    pub fn parse(&self) -> Result<(EmailAddress, Password)> {
        self.validate()?;
        Ok((
            EmailAddress::parse(self.email.as_str())?,
            Password::new(self.password.as_str())?,
        ))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Replacement password sent with a reset token.
#[derive(Clone, Validate, Serialize, Deserialize)]
pub struct NewPassword {
    #[validate(length(
        min = 8,
        max = 16,
        message = "Password must be 8 to 16 characters."
    ))]
    pub password: String,
}

impl NewPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn parse(&self) -> Result<Password> {
        self.validate()?;
        Password::new(self.password.as_str())
    }
}

impl std::fmt::Debug for NewPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPassword")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn test_credentials() {
        let (email, _) =
            Credentials::new("A@X.com", "password1").parse().unwrap();
        assert_eq!(email.as_str(), "a@x.com");

        let err = Credentials::new("not-an-email", "password1")
            .parse()
            .unwrap_err();
        match err {
            AuthError::Validation(errors) => {
                assert!(errors.field_errors().contains_key("email"))
            },
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            Credentials::new("a@x.com", "short").parse(),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_new_password() {
        assert!(NewPassword::new("newpassword").parse().is_ok());
        assert!(matches!(
            NewPassword::new("this-one-is-too-long").parse(),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let credentials = Credentials::new("a@x.com", "password1");
        assert!(!format!("{credentials:?}").contains("password1"));
    }
}
