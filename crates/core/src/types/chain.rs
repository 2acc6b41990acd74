//! Chain identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a [`ChainId`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainIdError {
    /// The input string is empty.
    #[error("chain id cannot be empty")]
    Empty,
    /// The input is not a decimal or `0x`-hex integer.
    #[error("chain id is not a valid integer: {0}")]
    Invalid(String),
}

/// A ledger chain identifier (EIP-155).
///
/// Wallets report chain ids as `0x`-prefixed hex strings, while configuration
/// files usually carry decimals. Both forms parse; serialization always uses
/// the hex form expected on the wire.
///
/// ```
/// use bemember_core::ChainId;
///
/// assert_eq!(ChainId::parse("0x1a4").unwrap(), ChainId::new(420));
/// assert_eq!(ChainId::parse("420").unwrap().to_hex(), "0x1a4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(u64);

impl ChainId {
    /// Create a chain id from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Parse from a decimal or `0x`-prefixed hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or not an integer.
    pub fn parse(s: &str) -> Result<Self, ChainIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChainIdError::Empty);
        }

        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };

        parsed
            .map(Self)
            .map_err(|_| ChainIdError::Invalid(s.to_owned()))
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The `0x`-prefixed lowercase hex form used by wallet RPC.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.to_hex())
    }
}

impl std::str::FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Serialize for ChainId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
