//! Input shape checks that run before any authorization.

use super::GuardError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 8;
pub const SEARCH_MIN_LEN: usize = 3;
pub const SEARCH_LIMIT: usize = 10;

/// 3 to 8 characters from `[A-Za-z0-9_.]`, returned lowercased.
///
/// Usernames are stored lowercase, so uniqueness and lookups ignore case.
pub fn username(name: &str) -> Result<String, GuardError> {
    let len = name.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(GuardError::Invalid(format!(
            "username must be {} to {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
    {
        return Err(GuardError::Invalid(format!(
            "username may not contain '{}'",
            c
        )));
    }
    Ok(name.to_ascii_lowercase())
}

pub fn search_prefix(prefix: &str) -> Result<&str, GuardError> {
    let prefix = prefix.trim();
    if prefix.chars().count() < SEARCH_MIN_LEN {
        return Err(GuardError::Invalid(format!(
            "search term must be at least {} characters",
            SEARCH_MIN_LEN
        )));
    }
    Ok(prefix)
}

pub fn message_content(content: &str) -> Result<(), GuardError> {
    if content.trim().is_empty() {
        return Err(GuardError::Invalid("message content is empty".to_string()));
    }
    Ok(())
}
