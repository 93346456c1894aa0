//! Validation rules shared by the auth request payloads.

use validator::ValidationError;

pub const MAX_USERNAME_LEN: usize = 50;

/// Usernames are 1-50 characters with no whitespace.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::new("username_invalid_length"));
    }

    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("username_contains_whitespace"));
    }

    Ok(())
}

/// Rejects values made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
