use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use bemember_core::{Address, ChainId};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use super::LedgerError;
use super::events::{WalletEvent, WalletSubscription, WatcherLease, spawn_watcher};
use super::provider::{ProviderError, WalletProvider};
use crate::config::ChainConfig;

const EVENT_BUFFER: usize = 32;

// =============================================================================
// ConnectionManager
// =============================================================================

/// Establishes wallet connections pinned to the expected chain.
///
/// One manager is shared per session. Cloning is cheap.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnectionManagerInner>,
}

struct ConnectionManagerInner {
    provider: Option<Arc<dyn WalletProvider>>,
    chain: ChainConfig,
    watch_interval: Duration,
    events: broadcast::Sender<WalletEvent>,
    watcher: Mutex<Weak<WatcherLease>>,
}

impl ConnectionManager {
    /// Create a manager. `provider` is `None` when no wallet is injected.
    #[must_use]
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        chain: ChainConfig,
        watch_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(ConnectionManagerInner {
                provider,
                chain,
                watch_interval,
                events,
                watcher: Mutex::new(Weak::new()),
            }),
        }
    }

    /// The chain this manager steers the wallet onto.
    #[must_use]
    pub fn chain(&self) -> &ChainConfig {
        &self.inner.chain
    }

    /// Whether a wallet capability is present.
    #[must_use]
    pub fn has_wallet(&self) -> bool {
        self.inner.provider.is_some()
    }

    fn provider(&self) -> Result<Arc<dyn WalletProvider>, LedgerError> {
        self.inner
            .provider
            .clone()
            .ok_or(LedgerError::UnavailableWallet)
    }

    /// Request account access and make sure the wallet is on the expected chain.
    ///
    /// # Errors
    ///
    /// - `UnavailableWallet` if no wallet is injected
    /// - `NoAccount` if the user declines or no account is exposed
    /// - `WrongNetwork` if the wallet cannot be moved onto the expected chain
    #[instrument(skip(self), fields(expected_chain = %self.inner.chain.chain_id))]
    pub async fn connect(&self) -> Result<Connection, LedgerError> {
        let provider = self.provider()?;

        let accounts = match provider.request("eth_requestAccounts", json!([])).await {
            Ok(value) => parse_accounts(&value)?,
            Err(e) if e.is_user_rejection() => return Err(LedgerError::NoAccount),
            Err(e) => return Err(LedgerError::rpc("eth_requestAccounts", e)),
        };
        let Some(account) = accounts.first() else {
            return Err(LedgerError::NoAccount);
        };
        let account = account.short();

        let connection = Connection {
            provider,
            chain: self.inner.chain.clone(),
        };
        self.ensure_network(&connection, &self.inner.chain).await?;

        info!(%account, "Wallet connected");
        Ok(connection)
    }

    /// Move the wallet onto `expected`, registering the chain if the wallet
    /// does not know it.
    ///
    /// # Errors
    ///
    /// Returns `WrongNetwork` carrying both chain ids if the wallet is still
    /// elsewhere after trying to switch and register.
    #[instrument(skip_all, fields(expected = %expected.chain_id))]
    pub async fn ensure_network(
        &self,
        connection: &Connection,
        expected: &ChainConfig,
    ) -> Result<(), LedgerError> {
        let actual = connection.chain_id().await?;
        if actual == expected.chain_id {
            return Ok(());
        }

        info!(%actual, "Wallet on a different chain, requesting switch");
        let wrong = |actual: Option<ChainId>| LedgerError::WrongNetwork {
            expected: expected.chain_id,
            actual,
        };

        match switch_chain(&*connection.provider, expected.chain_id).await {
            Ok(()) => {}
            Err(e) if e.is_unrecognized_chain() => {
                info!("Chain unknown to wallet, registering it");
                connection
                    .provider
                    .request(
                        "wallet_addEthereumChain",
                        json!([expected.to_add_chain_params()]),
                    )
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Wallet refused to register chain");
                        wrong(Some(actual))
                    })?;
                switch_chain(&*connection.provider, expected.chain_id)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Wallet refused to switch after registering");
                        wrong(Some(actual))
                    })?;
            }
            Err(e) => {
                warn!(error = %e, "Wallet refused to switch chain");
                return Err(wrong(Some(actual)));
            }
        }

        match connection.chain_id().await {
            Ok(now) if now == expected.chain_id => {
                info!("Wallet switched chain");
                Ok(())
            }
            Ok(now) => Err(wrong(Some(now))),
            Err(_) => Err(wrong(Some(actual))),
        }
    }

    /// Subscribe to account and chain change notifications.
    ///
    /// The first subscription starts a polling watcher; dropping the last
    /// subscription stops it. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `UnavailableWallet` if no wallet is injected.
    pub fn subscribe(&self) -> Result<WalletSubscription, LedgerError> {
        let provider = self.provider()?;
        let mut watcher = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let lease = if let Some(lease) = watcher.upgrade() {
            lease
        } else {
            let lease = Arc::new(spawn_watcher(
                provider,
                self.inner.watch_interval,
                self.inner.events.clone(),
            ));
            *watcher = Arc::downgrade(&lease);
            lease
        };

        Ok(WalletSubscription::new(self.inner.events.subscribe(), lease))
    }

    /// Whether a watcher task is currently running.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .strong_count()
            > 0
    }
}

async fn switch_chain(provider: &dyn WalletProvider, chain: ChainId) -> Result<(), ProviderError> {
    provider
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain.to_hex() }]),
        )
        .await
        .map(|_| ())
}

// =============================================================================
// Connection
// =============================================================================

/// A connected wallet handle on the expected chain.
#[derive(Clone)]
pub struct Connection {
    provider: Arc<dyn WalletProvider>,
    chain: ChainConfig,
}

impl Connection {
    #[must_use]
    pub const fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// The first authorized account.
    ///
    /// # Errors
    ///
    /// Returns `NoAccount` if the wallet exposes no authorized account.
    pub async fn current_address(&self) -> Result<Address, LedgerError> {
        let value = self.request("eth_accounts", json!([])).await?;
        parse_accounts(&value)?
            .into_iter()
            .next()
            .ok_or(LedgerError::NoAccount)
    }

    /// The wallet's active chain.
    ///
    /// # Errors
    ///
    /// Returns error if the wallet request fails or answers malformed data.
    pub async fn chain_id(&self) -> Result<ChainId, LedgerError> {
        let value = self.request("eth_chainId", json!([])).await?;
        parse_chain_id(&value)
    }

    /// Forward a raw request to the wallet.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the wallet fails the request.
    pub async fn request(&self, method: &'static str, params: Value) -> Result<Value, LedgerError> {
        self.provider
            .request(method, params)
            .await
            .map_err(|e| LedgerError::rpc(method, e))
    }
}

pub(super) fn parse_accounts(value: &Value) -> Result<Vec<Address>, LedgerError> {
    let invalid = |reason: String| LedgerError::InvalidResponse {
        method: "eth_accounts",
        reason,
    };
    let entries = value
        .as_array()
        .ok_or_else(|| invalid(format!("expected an array, got {value}")))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| invalid(format!("expected a string, got {entry}")))
                .and_then(|s| Address::parse(s).map_err(|e| invalid(e.to_string())))
        })
        .collect()
}

pub(super) fn parse_chain_id(value: &Value) -> Result<ChainId, LedgerError> {
    let invalid = |reason: String| LedgerError::InvalidResponse {
        method: "eth_chainId",
        reason,
    };
    let s = value
        .as_str()
        .ok_or_else(|| invalid(format!("expected a string, got {value}")))?;
    ChainId::parse(s).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;

    const ACCOUNT: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    /// Stateful wallet: tracks its active chain and the chains it knows.
    struct FakeWallet {
        chain: Mutex<u64>,
        known: Mutex<HashSet<u64>>,
        accounts: Vec<&'static str>,
        refuse_add: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeWallet {
        fn on_chain(chain: u64) -> Self {
            Self {
                chain: Mutex::new(chain),
                known: Mutex::new(HashSet::from([1, chain])),
                accounts: vec![ACCOUNT],
                refuse_add: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WalletProvider for FakeWallet {
        async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            self.calls.lock().unwrap().push(method.to_string());
            match method {
                "eth_requestAccounts" | "eth_accounts" => Ok(json!(self.accounts)),
                "eth_chainId" => Ok(json!(format!("{:#x}", *self.chain.lock().unwrap()))),
                "wallet_switchEthereumChain" => {
                    let id = ChainId::parse(params[0]["chainId"].as_str().unwrap()).unwrap();
                    if self.known.lock().unwrap().contains(&id.as_u64()) {
                        *self.chain.lock().unwrap() = id.as_u64();
                        Ok(Value::Null)
                    } else {
                        Err(ProviderError::Rpc {
                            code: ProviderError::UNRECOGNIZED_CHAIN,
                            message: "Unrecognized chain ID".to_string(),
                        })
                    }
                }
                "wallet_addEthereumChain" => {
                    if self.refuse_add {
                        return Err(ProviderError::Rpc {
                            code: ProviderError::USER_REJECTED,
                            message: "User rejected the request".to_string(),
                        });
                    }
                    let id = ChainId::parse(params[0]["chainId"].as_str().unwrap()).unwrap();
                    self.known.lock().unwrap().insert(id.as_u64());
                    Ok(Value::Null)
                }
                other => Err(ProviderError::Rpc {
                    code: -32601,
                    message: format!("method {other} not found"),
                }),
            }
        }
    }

    fn manager(wallet: &Arc<FakeWallet>) -> ConnectionManager {
        let provider: Arc<dyn WalletProvider> = wallet.clone();
        ConnectionManager::new(
            Some(provider),
            ChainConfig::monad_testnet(),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_connect_without_wallet() {
        let manager = ConnectionManager::new(
            None,
            ChainConfig::monad_testnet(),
            Duration::from_secs(1),
        );
        assert!(!manager.has_wallet());
        let err = manager.connect().await.err().unwrap();
        assert!(matches!(err, LedgerError::UnavailableWallet));
        assert!(matches!(
            manager.subscribe().err().unwrap(),
            LedgerError::UnavailableWallet
        ));
    }

    #[tokio::test]
    async fn test_connect_on_expected_chain_skips_switch() {
        let wallet = Arc::new(FakeWallet::on_chain(0x1a4));
        let connection = manager(&wallet).connect().await.unwrap();

        assert_eq!(connection.current_address().await.unwrap().as_str(), ACCOUNT);
        assert!(
            !wallet
                .calls()
                .iter()
                .any(|m| m == "wallet_switchEthereumChain")
        );
    }

    #[tokio::test]
    async fn test_connect_registers_unknown_chain() {
        let wallet = Arc::new(FakeWallet::on_chain(1));
        manager(&wallet).connect().await.unwrap();

        assert_eq!(*wallet.chain.lock().unwrap(), 0x1a4);
        assert_eq!(
            wallet.calls(),
            vec![
                "eth_requestAccounts",
                "eth_chainId",
                "wallet_switchEthereumChain",
                "wallet_addEthereumChain",
                "wallet_switchEthereumChain",
                "eth_chainId",
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_wrong_network_when_register_refused() {
        let mut wallet = FakeWallet::on_chain(1);
        wallet.refuse_add = true;
        let wallet = Arc::new(wallet);

        let err = manager(&wallet).connect().await.err().unwrap();
        match err {
            LedgerError::WrongNetwork { expected, actual } => {
                assert_eq!(expected, ChainId::new(0x1a4));
                assert_eq!(actual, Some(ChainId::new(1)));
            }
            other => panic!("expected WrongNetwork, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_without_accounts() {
        let mut wallet = FakeWallet::on_chain(0x1a4);
        wallet.accounts = vec![];
        let err = manager(&Arc::new(wallet)).connect().await.err().unwrap();
        assert!(matches!(err, LedgerError::NoAccount));
    }

    #[tokio::test]
    async fn test_watcher_stops_when_last_subscription_dropped() {
        let wallet = Arc::new(FakeWallet::on_chain(0x1a4));
        let manager = manager(&wallet);

        let first = manager.subscribe().unwrap();
        let second = manager.subscribe().unwrap();
        assert!(manager.is_watching());

        drop(first);
        assert!(manager.is_watching());
        drop(second);
        assert!(!manager.is_watching());
    }

    #[tokio::test]
    async fn test_watcher_reports_chain_change() {
        let wallet = Arc::new(FakeWallet::on_chain(0x1a4));
        let manager = manager(&wallet);
        let mut subscription = manager.subscribe().unwrap();

        // Let the watcher take its baseline reading.
        tokio::time::sleep(Duration::from_millis(30)).await;
        *wallet.chain.lock().unwrap() = 1;

        let event = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(WalletEvent::ChainChanged(ChainId::new(1))));
    }

    #[test]
    fn test_parse_accounts_rejects_garbage() {
        assert!(parse_accounts(&json!("0xabc")).is_err());
        assert!(parse_accounts(&json!(["not-an-address"])).is_err());
        assert!(parse_accounts(&json!([])).unwrap().is_empty());
    }
}
