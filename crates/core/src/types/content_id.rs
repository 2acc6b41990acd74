//! Content identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a [`ContentId`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentIdError {
    /// The input string is empty.
    #[error("content id cannot be empty")]
    Empty,
    /// The input contains whitespace.
    #[error("content id cannot contain whitespace")]
    Whitespace,
}

/// An opaque content identifier returned by a content-addressed store.
///
/// Genuine identifiers are passed through unchanged. Identifiers synthesized
/// locally when the store is unreachable carry the [`ContentId::PLACEHOLDER_PREFIX`]
/// so they can never be confused with a retrievable one.
///
/// ```
/// use bemember_core::ContentId;
///
/// let cid = ContentId::parse("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap();
/// assert!(!cid.is_placeholder());
///
/// let local = ContentId::placeholder("ada-lovelace", 1_700_000_000_000, "k3j9x0ab");
/// assert_eq!(local.as_str(), "local-ada-lovelace-1700000000000-k3j9x0ab");
/// assert!(local.is_placeholder());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Reserved prefix for locally synthesized identifiers.
    pub const PLACEHOLDER_PREFIX: &'static str = "local-";

    /// Parse a content identifier.
    ///
    /// The value is opaque: only emptiness and embedded whitespace are rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, ContentIdError> {
        if s.is_empty() {
            return Err(ContentIdError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(ContentIdError::Whitespace);
        }
        Ok(Self(s.to_owned()))
    }

    /// Wrap an identifier read back from the registry as-is.
    ///
    /// Entries written by other clients are not re-validated; only an empty
    /// value, meaning no entry, yields `None`.
    #[must_use]
    pub fn from_opaque(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if s.is_empty() { None } else { Some(Self(s)) }
    }

    /// Build a placeholder identifier from its parts.
    #[must_use]
    pub fn placeholder(fragment: &str, timestamp_millis: i64, suffix: &str) -> Self {
        Self(format!(
            "{}{fragment}-{timestamp_millis}-{suffix}",
            Self::PLACEHOLDER_PREFIX
        ))
    }

    /// Whether this identifier was synthesized locally rather than returned by a store.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(Self::PLACEHOLDER_PREFIX)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ContentId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ContentId {
    type Err = ContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
