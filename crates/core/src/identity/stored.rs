//! Wire form of an identity record as persisted to the content store.

use serde::{Deserialize, Serialize};

/// The JSON document uploaded to (and read back from) the content store.
///
/// Only content-side fields live here. Ledger-side attributes (owner address,
/// confirmation reference) are never persisted to the store.
///
/// `title` and `company` are legacy keys written by older clients. They are
/// accepted on read as fallbacks for `role` and `organization` and are never
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCard {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farcaster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub is_transferable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub title: Option<String>,
    #[serde(default, skip_serializing)]
    pub company: Option<String>,
}

impl StoredCard {
    /// Decode a stored card from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a JSON object with at least a `name`.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode as pretty-printed JSON (two-space indentation).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
