//! The `VAULT(secret/...)` placeholder syntax.
//!
//! A string value in the configuration document may name a secret key
//! inline: `"password": "VAULT(secret/password)"`. The content between the
//! parentheses is passed verbatim to the secret store.

use crate::error::PlaceholderError;

/// Opening delimiter shared by every placeholder.
pub const PLACEHOLDER_PREFIX: &str = "VAULT(";
/// Required key namespace; `VAULT(auth/x)` is rejected.
pub const SECRET_PREFIX: &str = "VAULT(secret/";
/// Closing delimiter.
pub const PLACEHOLDER_SUFFIX: &str = ")";

/// Whether a string value should be treated as a placeholder at all.
///
/// Strings without the opening delimiter are plain values, not errors.
pub fn looks_like_placeholder(value: &str) -> bool {
    value.starts_with(PLACEHOLDER_PREFIX)
}

/// Extract the secret path from a placeholder.
///
/// `VAULT(secret/password)` yields `secret/password`. Rejects a missing or
/// wrong prefix and a missing closing delimiter. Surrounding whitespace is
/// not tolerated: `" VAULT(secret/x) "` is a malformed value.
pub fn parse_placeholder(value: &str) -> Result<&str, PlaceholderError> {
    if !value.starts_with(SECRET_PREFIX) {
        return Err(PlaceholderError::MissingPrefix {
            value: value.to_string(),
            expected: SECRET_PREFIX,
        });
    }
    let inner = &value[PLACEHOLDER_PREFIX.len()..];
    let inner = inner
        .strip_suffix(PLACEHOLDER_SUFFIX)
        .ok_or_else(|| PlaceholderError::MissingSuffix {
            value: value.to_string(),
            expected: PLACEHOLDER_SUFFIX,
        })?;
    Ok(inner)
}
