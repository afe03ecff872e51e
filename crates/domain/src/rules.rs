//! Field rules shared by request types.

use std::borrow::Cow;

use validator::{ValidateEmail, ValidationError};

/// Rejects empty or whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Checks email syntax. Blank values are left to [`not_blank`].
pub fn email_format(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.validate_email() {
        return Ok(());
    }
    Err(ValidationError::new("email"))
}

pub(crate) fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}
