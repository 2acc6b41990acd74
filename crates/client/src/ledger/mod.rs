//! Ledger connection manager.
//!
//! # Architecture
//!
//! - [`WalletProvider`] is the seam to an external wallet capability
//! - [`ConnectionManager`] detects the wallet, requests account access and
//!   steers the wallet onto the expected chain
//! - [`Connection`] is a connected, on-network handle used by the registry
//! - [`WalletSubscription`] streams account and chain changes; dropping the
//!   last subscription stops the underlying watcher
//!
//! Every request to the wallet is made in the foreground of the caller's task,
//! except the watcher, which polls on its own task.

mod connection;
mod events;
mod provider;

pub use connection::{Connection, ConnectionManager};
pub use events::{WalletEvent, WalletSubscription};
pub use provider::{HttpWalletProvider, ProviderError, WalletProvider};

use std::time::Duration;

use bemember_core::{ChainId, TxHash};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors from wallet and ledger interactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No wallet capability is present.
    #[error("no wallet available")]
    UnavailableWallet,

    /// The wallet is present but exposed no authorized account.
    #[error("no wallet account authorized")]
    NoAccount,

    /// The wallet is on a different chain and could not be switched.
    #[error("wrong network: expected chain {expected}, wallet is on {}", display_chain(.actual))]
    WrongNetwork {
        expected: ChainId,
        actual: Option<ChainId>,
    },

    /// The ledger refused or reverted the transaction.
    #[error("ledger rejected the submission: {reason}")]
    Rejected {
        reason: String,
        /// Set when the transaction reached the ledger before failing.
        tx: Option<TxHash>,
    },

    /// A wallet request failed.
    #[error("wallet request {method} failed: {source}")]
    Rpc {
        method: &'static str,
        source: ProviderError,
    },

    /// A wait exceeded its allotted duration.
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    /// The wallet answered with a value of the wrong shape.
    #[error("unexpected response to {method}: {reason}")]
    InvalidResponse {
        method: &'static str,
        reason: String,
    },
}

impl LedgerError {
    /// Coarse classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnavailableWallet => ErrorKind::UnavailableWallet,
            Self::NoAccount => ErrorKind::NoAccount,
            Self::WrongNetwork { .. } => ErrorKind::WrongNetwork,
            Self::Rejected { .. } | Self::Rpc { .. } | Self::InvalidResponse { .. } => {
                ErrorKind::LedgerRejected
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub(crate) const fn rpc(method: &'static str, source: ProviderError) -> Self {
        Self::Rpc { method, source }
    }
}

#[allow(clippy::ref_option)]
fn display_chain(chain: &Option<ChainId>) -> String {
    chain.map_or_else(|| "an unknown chain".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_network_message_carries_both_chains() {
        let err = LedgerError::WrongNetwork {
            expected: ChainId::new(420),
            actual: Some(ChainId::new(1)),
        };
        assert_eq!(
            err.to_string(),
            "wrong network: expected chain 420 (0x1a4), wallet is on 1 (0x1)"
        );
        assert_eq!(err.kind(), ErrorKind::WrongNetwork);
    }

    #[test]
    fn test_wrong_network_unknown_actual() {
        let err = LedgerError::WrongNetwork {
            expected: ChainId::new(420),
            actual: None,
        };
        assert!(err.to_string().ends_with("an unknown chain"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            LedgerError::UnavailableWallet.kind(),
            ErrorKind::UnavailableWallet
        );
        assert_eq!(
            LedgerError::rpc("eth_call", ProviderError::Transport("down".to_string())).kind(),
            ErrorKind::LedgerRejected
        );
        assert_eq!(
            LedgerError::Timeout {
                stage: "ledger_confirmation",
                after: Duration::from_secs(1)
            }
            .kind(),
            ErrorKind::Timeout
        );
    }
}
