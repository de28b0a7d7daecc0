//! Unit identifiers
//!
//! A unit id is derived from its directory name (skills) or file stem
//! (subagents, commands, rules). The canonical form is kebab-case:
//! `^[a-z0-9]+(-[a-z0-9]+)*$`.
//!
//! Non-canonical ids are still accepted so that a badly named unit can be
//! reported with a warning instead of disappearing from the manifest.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Unit id must not be empty")]
    Empty,

    #[error("Unit id must not contain whitespace or path separators: '{0}'")]
    InvalidChars(String),
}

/// Returns true if `s` matches `^[a-z0-9]+(-[a-z0-9]+)*$`
pub fn is_kebab_case(s: &str) -> bool {
    !s.is_empty()
        && s.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

/// Identifier of a unit, unique across the whole corpus
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(String);

impl UnitId {
    /// Creates an id, rejecting values that cannot name a file
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            return Err(IdError::InvalidChars(value));
        }
        Ok(Self(value))
    }

    /// Builds a reportable id from a file name that `new` rejects
    ///
    /// Whitespace and separators become `-`; an empty name becomes `unnamed`.
    pub fn from_file_name(name: &str) -> Self {
        let cleaned: String = name
            .chars()
            .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '-' } else { c })
            .collect();
        if cleaned.is_empty() {
            Self("unnamed".to_string())
        } else {
            Self(cleaned)
        }
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is in canonical kebab-case
    pub fn is_kebab_case(&self) -> bool {
        is_kebab_case(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UnitId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for UnitId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.0
    }
}

impl Borrow<str> for UnitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
