//! Value objects and entities shared by every layer.

pub mod email;
pub mod identity;
pub mod password;

pub use email::*;
pub use identity::*;
pub use password::*;

use std::borrow::Cow;

use validator::{ValidationError, ValidationErrors};

/// Build a single-field [`ValidationErrors`].
pub(crate) fn invalid_field(
    field: &'static str,
    code: &'static str,
    message: &'static str,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        field,
        ValidationError::new(code).with_message(Cow::Borrowed(message)),
    );
    errors
}
