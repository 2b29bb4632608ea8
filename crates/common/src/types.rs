//! Common data types for Gatehouse components.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a key-space identifier.
pub const MAX_KEYSPACE_ID_LEN: usize = 128;

/// Identifier of a key-space: the unit of serialization in the coordinator.
///
/// Every action for one key-space runs on the same actor, one at a time.
/// Allowed characters are ASCII alphanumerics plus `-`, `_`, `.` and `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeySpaceId(String);

/// Reasons a key-space identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySpaceIdError {
    #[error("key-space id must not be empty")]
    Empty,

    #[error("key-space id exceeds 128 characters")]
    TooLong,

    #[error("key-space id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl KeySpaceId {
    /// Validate and wrap a key-space identifier.
    ///
    /// # Errors
    ///
    /// Returns `KeySpaceIdError` if the id is empty, too long, or contains
    /// characters outside the allowed set.
    pub fn parse(raw: impl Into<String>) -> Result<Self, KeySpaceIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(KeySpaceIdError::Empty);
        }
        if raw.len() > MAX_KEYSPACE_ID_LEN {
            return Err(KeySpaceIdError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
        {
            return Err(KeySpaceIdError::InvalidCharacter(c));
        }
        Ok(Self(raw))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeySpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for KeySpaceId {
    type Error = KeySpaceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<KeySpaceId> for String {
    fn from(id: KeySpaceId) -> Self {
        id.0
    }
}
