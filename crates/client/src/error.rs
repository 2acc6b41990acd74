//! Error taxonomy shared by every client component.
//!
//! Each subsystem has its own `thiserror` enum carrying structured detail
//! (expected vs. actual chain, which store failed, which address was queried).
//! [`ErrorKind`] is the coarse classification a caller branches on to decide
//! what guidance to render.

use core::fmt;

use serde::Serialize;

/// Coarse classification of every externally surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No wallet capability is present.
    UnavailableWallet,
    /// A wallet is present but no account is authorized.
    NoAccount,
    /// The active chain differs from the expected chain and could not be switched.
    WrongNetwork,
    /// The content store is unreachable or rejected the write.
    StoreUnavailable,
    /// No entry exists for the queried content id or address.
    NotFound,
    /// The store returned data that is not an identity record.
    InvalidData,
    /// The ledger refused or reverted the submission.
    LedgerRejected,
    /// A suspension point exceeded its allotted wait.
    Timeout,
    /// Required identity record fields are absent.
    ValidationFailed,
    /// The submission is already in flight or already confirmed.
    Conflict,
}

impl ErrorKind {
    /// Stable snake_case name, for logs and machine-readable output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnavailableWallet => "unavailable_wallet",
            Self::NoAccount => "no_account",
            Self::WrongNetwork => "wrong_network",
            Self::StoreUnavailable => "store_unavailable",
            Self::NotFound => "not_found",
            Self::InvalidData => "invalid_data",
            Self::LedgerRejected => "ledger_rejected",
            Self::Timeout => "timeout",
            Self::ValidationFailed => "validation_failed",
            Self::Conflict => "conflict",
        }
    }

    /// Whether the same attempt may succeed if simply retried later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable | Self::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
