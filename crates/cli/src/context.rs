//! Clients shared across commands, built once from configuration.

use std::sync::Arc;

use bemember_client::{
    ClientConfig, ConfigError, ConnectionManager, ContentStore, FallbackContentStore,
    HttpWalletProvider, IpfsContentStore, ProviderError, RegistryClient, StoreError,
    UploadOrchestrator, WalletProvider,
};

/// Error wiring up the command context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Wallet(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configured clients for one CLI invocation.
pub struct AppContext {
    config: ClientConfig,
    ipfs: IpfsContentStore,
    store: Arc<dyn ContentStore>,
    ledger: ConnectionManager,
}

impl AppContext {
    /// Build the content store and connection manager.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ContextError> {
        let ipfs = IpfsContentStore::new(&config.ipfs, config.timeouts.store_request())?;
        let store: Arc<dyn ContentStore> = Arc::new(FallbackContentStore::new(ipfs.clone()));

        let provider = config
            .wallet_url
            .clone()
            .map(|url| HttpWalletProvider::new(url, config.timeouts.confirmation))
            .transpose()?
            .map(|p| Arc::new(p) as Arc<dyn WalletProvider>);
        let ledger = ConnectionManager::new(
            provider,
            config.chain.clone(),
            config.timeouts.watch_interval,
        );

        Ok(Self {
            config,
            ipfs,
            store,
            ledger,
        })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Direct IPFS access, for gateway links and reads without the fallback.
    pub const fn ipfs(&self) -> &IpfsContentStore {
        &self.ipfs
    }

    pub const fn ledger(&self) -> &ConnectionManager {
        &self.ledger
    }

    /// Registry client for the configured contract.
    ///
    /// # Errors
    ///
    /// Returns an error if no contract address is configured.
    pub fn registry(&self) -> Result<RegistryClient, ConfigError> {
        let contract = self.config.require_contract()?;
        Ok(RegistryClient::new(
            contract.clone(),
            self.config.timeouts.confirmation,
            self.config.timeouts.receipt_poll,
        ))
    }

    /// Orchestrator wired to the fallback store, the wallet and the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if no contract address is configured.
    pub fn orchestrator(&self) -> Result<UploadOrchestrator, ConfigError> {
        Ok(UploadOrchestrator::new(
            Arc::clone(&self.store),
            self.ledger.clone(),
            self.registry()?,
            self.config.timeouts.store,
        ))
    }
}
