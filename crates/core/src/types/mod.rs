//! Core types for BeMember.
//!
//! This module provides type-safe wrappers for ledger and content-store identifiers.

pub mod chain;
pub mod content_id;
pub mod id;

pub use chain::{ChainId, ChainIdError};
pub use content_id::{ContentId, ContentIdError};
pub use id::{Address, HexIdError, TxHash};
