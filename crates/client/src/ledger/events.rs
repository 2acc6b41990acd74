use std::sync::Arc;
use std::time::Duration;

use bemember_core::{Address, ChainId};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::provider::WalletProvider;
use super::connection::{parse_accounts, parse_chain_id};

/// Account or chain change reported by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The set of authorized accounts changed. Empty means disconnected.
    AccountsChanged(Vec<Address>),
    /// The wallet's active chain changed.
    ChainChanged(ChainId),
}

/// Scoped subscription to wallet events.
///
/// The watcher keeps polling while any subscription is alive and stops when
/// the last one is dropped.
pub struct WalletSubscription {
    receiver: broadcast::Receiver<WalletEvent>,
    _lease: Arc<WatcherLease>,
}

impl WalletSubscription {
    pub(super) const fn new(
        receiver: broadcast::Receiver<WalletEvent>,
        lease: Arc<WatcherLease>,
    ) -> Self {
        Self {
            receiver,
            _lease: lease,
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the watcher has shut down. Events missed by a slow
    /// consumer are skipped.
    pub async fn recv(&mut self) -> Option<WalletEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Wallet event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Owns the polling task. Aborts it on drop.
pub(super) struct WatcherLease {
    handle: JoinHandle<()>,
}

impl Drop for WatcherLease {
    fn drop(&mut self) {
        debug!("Stopping wallet watcher");
        self.handle.abort();
    }
}

/// Start polling the wallet for account and chain changes.
///
/// Must be called from within a tokio runtime.
pub(super) fn spawn_watcher(
    provider: Arc<dyn WalletProvider>,
    every: Duration,
    events: broadcast::Sender<WalletEvent>,
) -> WatcherLease {
    let handle = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_accounts: Option<Vec<Address>> = None;
        let mut last_chain: Option<ChainId> = None;

        loop {
            ticker.tick().await;

            match provider.request("eth_accounts", json!([])).await {
                Ok(value) => match parse_accounts(&value) {
                    Ok(accounts) => {
                        if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                            let _ = events.send(WalletEvent::AccountsChanged(accounts.clone()));
                        }
                        last_accounts = Some(accounts);
                    }
                    Err(e) => debug!(error = %e, "Ignoring malformed eth_accounts"),
                },
                Err(e) => debug!(error = %e, "eth_accounts poll failed"),
            }

            match provider.request("eth_chainId", json!([])).await {
                Ok(value) => match parse_chain_id(&value) {
                    Ok(chain) => {
                        if last_chain.is_some_and(|prev| prev != chain) {
                            let _ = events.send(WalletEvent::ChainChanged(chain));
                        }
                        last_chain = Some(chain);
                    }
                    Err(e) => debug!(error = %e, "Ignoring malformed eth_chainId"),
                },
                Err(e) => debug!(error = %e, "eth_chainId poll failed"),
            }
        }
    });

    WatcherLease { handle }
}
