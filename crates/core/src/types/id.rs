//! Hex-encoded ledger identifiers.
//!
//! Use the `define_hex_id!` macro to create type-safe wrappers around
//! `0x`-prefixed hex strings of a fixed byte length, so a transaction hash can
//! never be passed where an account address is expected.

use thiserror::Error;

/// Errors that can occur when parsing a hex identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexIdError {
    /// The input does not start with `0x`.
    #[error("{kind} must start with 0x")]
    MissingPrefix {
        /// Identifier kind, for messages.
        kind: &'static str,
    },
    /// The input has the wrong number of hex digits.
    #[error("{kind} must be {expected} hex characters after 0x (got {actual})")]
    WrongLength {
        /// Identifier kind, for messages.
        kind: &'static str,
        /// Expected number of hex characters.
        expected: usize,
        /// Actual number of hex characters.
        actual: usize,
    },
    /// The input contains a non-hex character.
    #[error("{kind} contains a non-hex character")]
    InvalidHex {
        /// Identifier kind, for messages.
        kind: &'static str,
    },
}

/// Validate and normalize a `0x`-prefixed hex string of `bytes` bytes.
///
/// The returned string is lowercase.
///
/// # Errors
///
/// Returns an error if the prefix, length, or digits are invalid.
pub fn parse_hex(kind: &'static str, s: &str, bytes: usize) -> Result<String, HexIdError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(HexIdError::MissingPrefix { kind })?;

    if digits.len() != bytes * 2 {
        return Err(HexIdError::WrongLength {
            kind,
            expected: bytes * 2,
            actual: digits.len(),
        });
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HexIdError::InvalidHex { kind });
    }

    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

/// Raw bytes of a `0x`-prefixed hex string. Empty if the digits are invalid.
#[must_use]
pub fn decode_hex(s: &str) -> Vec<u8> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).unwrap_or_default()
}

/// Macro to define a type-safe hex identifier wrapper.
///
/// Creates a newtype wrapper around a lowercase `0x`-prefixed `String` with:
/// - `Serialize`/`Deserialize` (deserialization validates)
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()`, `as_str()`, `to_bytes()`
/// - `Display`, `FromStr`, and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use bemember_core::define_hex_id;
/// define_hex_id!(BlockHash, "block hash", 32);
///
/// let hash = BlockHash::parse(&format!("0x{}", "ab".repeat(32))).unwrap();
/// assert_eq!(hash.to_bytes().len(), 32);
/// ```
#[macro_export]
macro_rules! define_hex_id {
    ($name:ident, $kind:literal, $bytes:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Number of raw bytes this identifier encodes.
            pub const BYTES: usize = $bytes;

            /// Parse from a `0x`-prefixed hex string (case-insensitive).
            ///
            /// # Errors
            ///
            /// Returns an error if the input is not `0x` followed by exactly
            /// the expected number of hex digits.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::HexIdError> {
                $crate::types::id::parse_hex($kind, s, $bytes).map(Self)
            }

            /// Returns the lowercase `0x`-prefixed string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the raw bytes.
            #[must_use]
            pub fn to_bytes(&self) -> ::std::vec::Vec<u8> {
                $crate::types::id::decode_hex(&self.0)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::HexIdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::parse(&s).map_err(::serde::de::Error::custom)
            }
        }
    };
}

define_hex_id!(Address, "address", 20);
define_hex_id!(TxHash, "transaction hash", 32);

impl Address {
    /// Abbreviated form for display, e.g. `0x1234...abcd`.
    #[must_use]
    pub fn short(&self) -> String {
        let head = self.0.get(..6).unwrap_or_default();
        let tail = self.0.get(self.0.len() - 4..).unwrap_or_default();
        format!("{head}...{tail}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ADDR: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_parse_address_normalizes_case() {
        let addr = Address::parse(ADDR).unwrap();
        assert_eq!(addr.as_str(), "0x52908400098527886e0f7030069857d2e4169ee7");
    }

    #[test]
    fn test_parse_address_missing_prefix() {
        assert!(matches!(
            Address::parse("52908400098527886E0F7030069857D2E4169EE7"),
            Err(HexIdError::MissingPrefix { .. })
        ));
    }

    #[test]
    fn test_parse_address_wrong_length() {
        assert!(matches!(
            Address::parse("0x1234"),
            Err(HexIdError::WrongLength {
                expected: 40,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_address_invalid_hex() {
        let bad = format!("0x{}", "zz".repeat(20));
        assert!(matches!(
            Address::parse(&bad),
            Err(HexIdError::InvalidHex { .. })
        ));
    }

    #[test]
    fn test_address_bytes() {
        let addr = Address::parse(ADDR).unwrap();
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes.first(), Some(&0x52));
        assert_eq!(bytes.last(), Some(&0xe7));
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0x00ff10"), vec![0x00, 0xff, 0x10]);
        assert_eq!(decode_hex("0xABcd"), vec![0xab, 0xcd]);
        assert!(decode_hex("0xzz").is_empty());
    }

    #[test]
    fn test_tx_hash_bytes() {
        let tx = TxHash::parse(&format!("0x{}", "0a".repeat(32))).unwrap();
        assert_eq!(tx.to_bytes(), vec![0x0a; 32]);
    }

    #[test]
    fn test_address_short() {
        let addr = Address::parse(ADDR).unwrap();
        assert_eq!(addr.short(), "0x5290...9ee7");
    }

    #[test]
    fn test_tx_hash_length() {
        assert!(TxHash::parse(&format!("0x{}", "a".repeat(64))).is_ok());
        assert!(TxHash::parse(&format!("0x{}", "a".repeat(40))).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Address, _> = serde_json::from_str(&format!("\"{ADDR}\""));
        assert!(ok.is_ok());

        let bad: Result<Address, _> = serde_json::from_str("\"0xnope\"");
        assert!(bad.is_err());
    }
}
