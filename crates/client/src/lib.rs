//! BeMember client library.
//!
//! Everything that talks to the outside world lives here:
//! - an IPFS content store with a local placeholder fallback
//! - a wallet connection manager pinned to the expected chain
//! - a typed client for the on-chain card registry
//! - the upload orchestrator that composes them
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bemember_client::{
//!     ClientConfig, ConnectionManager, FallbackContentStore, IpfsContentStore, RegistryClient,
//!     Submission, UploadOrchestrator,
//! };
//! use bemember_core::IdentityRecord;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let store = FallbackContentStore::new(IpfsContentStore::new(&config.ipfs, config.timeouts.store_request())?);
//! let ledger = ConnectionManager::new(None, config.chain.clone(), config.timeouts.watch_interval);
//! let registry = RegistryClient::new(
//!     config.require_contract()?.clone(),
//!     config.timeouts.confirmation,
//!     config.timeouts.receipt_poll,
//! );
//! let orchestrator = UploadOrchestrator::new(Arc::new(store), ledger, registry, config.timeouts.store);
//!
//! let mut record = IdentityRecord::empty();
//! record.name = "Ada Lovelace".to_string();
//! record.tagline = Some("Engineer at Acme".to_string());
//!
//! let receipt = orchestrator.submit(&Submission::new(record), None).await?;
//! println!("{}", receipt.content_id);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content_store;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod registry;
pub mod scan;

pub use config::{ChainConfig, ClientConfig, ConfigError, IpfsConfig, Timeouts};
pub use content_store::{
    ContentStore, FallbackContentStore, ImageBlob, IpfsContentStore, StoreError,
};
pub use error::ErrorKind;
pub use ledger::{
    Connection, ConnectionManager, HttpWalletProvider, LedgerError, ProviderError, WalletEvent,
    WalletProvider, WalletSubscription,
};
pub use orchestrator::{Receipt, Submission, SubmitError, UploadOrchestrator, UploadPhase, UploadState};
pub use registry::{Confirmation, RegistryClient};
pub use scan::{MockCardScanner, ScanError};
