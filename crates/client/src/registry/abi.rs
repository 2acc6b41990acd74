//! Minimal ABI codec for the card registry contract.
//!
//! Only the shapes the registry uses are supported: a single dynamic `string`
//! argument or return value, and a single `address` argument.

use bemember_core::Address;
use thiserror::Error;

/// `uploadCard(string)`
pub const UPLOAD_CARD: [u8; 4] = [0xe1, 0x5d, 0x63, 0x6f];
/// `getCardCID(address)`
pub const GET_CARD_CID: [u8; 4] = [0xf2, 0x6d, 0x54, 0xbe];
/// `myCardCID()`
pub const MY_CARD_CID: [u8; 4] = [0x93, 0x4e, 0x96, 0x2c];
/// `keccak256("CardUploaded(address,string)")`
pub const CARD_UPLOADED_TOPIC: &str =
    "0x3d7fcac1f44d5ccf4b8eea9927614d1fc6749d03e2bfcdc4106460185be6c0f3";

const WORD: usize = 32;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("abi data truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("abi offset or length out of range")]
    OffsetOutOfRange,
    #[error("abi string is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// A decoded `CardUploaded` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardUploaded {
    pub user: Address,
    pub cid: String,
}

/// Calldata for `uploadCard(cid)`.
#[must_use]
pub fn encode_upload_card(cid: &str) -> String {
    let mut data = UPLOAD_CARD.to_vec();
    data.extend_from_slice(&usize_word(WORD));
    data.extend_from_slice(&usize_word(cid.len()));
    data.extend_from_slice(cid.as_bytes());
    let padding = (WORD - cid.len() % WORD) % WORD;
    data.resize(data.len() + padding, 0);
    to_hex(&data)
}

/// Calldata for `getCardCID(user)`.
#[must_use]
pub fn encode_get_card_cid(user: &Address) -> String {
    let mut data = GET_CARD_CID.to_vec();
    data.resize(4 + WORD - Address::BYTES, 0);
    data.extend_from_slice(&user.to_bytes());
    to_hex(&data)
}

/// Calldata for `myCardCID()`.
#[must_use]
pub fn encode_my_card_cid() -> String {
    to_hex(&MY_CARD_CID)
}

/// Decode a single ABI-encoded `string` (return value or event data).
///
/// # Errors
///
/// Returns error if the data is not a well-formed ABI string. An empty `0x`
/// result, as returned for calls to an address without code, is an error.
pub fn decode_string(hex_data: &str) -> Result<String, AbiError> {
    let data = from_hex(hex_data)?;
    let offset = read_usize(&data, 0)?;
    let len = read_usize(&data, offset)?;
    let start = offset.checked_add(WORD).ok_or(AbiError::OffsetOutOfRange)?;
    let end = start.checked_add(len).ok_or(AbiError::OffsetOutOfRange)?;
    let bytes = data.get(start..end).ok_or(AbiError::Truncated {
        needed: end,
        actual: data.len(),
    })?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

/// Decode a `CardUploaded` log. Returns `None` for logs of other events.
///
/// # Errors
///
/// Returns error if the log claims to be `CardUploaded` but is malformed.
pub fn decode_card_uploaded(
    topics: &[String],
    data: &str,
) -> Result<Option<CardUploaded>, AbiError> {
    let Some(topic0) = topics.first() else {
        return Ok(None);
    };
    if !topic0.eq_ignore_ascii_case(CARD_UPLOADED_TOPIC) {
        return Ok(None);
    }

    let user_topic = topics.get(1).ok_or(AbiError::Truncated {
        needed: 2,
        actual: topics.len(),
    })?;
    let word = from_hex(user_topic)?;
    let address_bytes = word.get(WORD - Address::BYTES..WORD).ok_or(AbiError::Truncated {
        needed: WORD,
        actual: word.len(),
    })?;
    let user = Address::parse(&to_hex(address_bytes))
        .map_err(|e| AbiError::InvalidHex(e.to_string()))?;

    Ok(Some(CardUploaded {
        user,
        cid: decode_string(data)?,
    }))
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    for (slot, byte) in word.iter_mut().rev().zip((value as u64).to_le_bytes()) {
        *slot = byte;
    }
    word
}

/// Read the 32-byte word at `at` as a length or offset.
fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let end = at.checked_add(WORD).ok_or(AbiError::OffsetOutOfRange)?;
    let word = data.get(at..end).ok_or(AbiError::Truncated {
        needed: end,
        actual: data.len(),
    })?;
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|&b| b != 0) {
        return Err(AbiError::OffsetOutOfRange);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| AbiError::OffsetOutOfRange)
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn from_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| AbiError::InvalidHex(e.to_string()))
}
