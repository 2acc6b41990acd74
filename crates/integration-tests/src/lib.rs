//! Integration test support for BeMember.
//!
//! Provides in-memory fakes for the two external collaborators, a wallet
//! provider and a content store, plus a [`Harness`] that wires them into a
//! real [`UploadOrchestrator`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bemember-integration-tests
//! ```
//!
//! No network access is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bemember_client::registry::abi;
use bemember_client::{
    ChainConfig, ConnectionManager, ContentStore, ImageBlob, ProviderError, RegistryClient,
    StoreError, UploadOrchestrator, WalletProvider,
};
use bemember_core::{Address, ContentId, IdentityRecord};
use serde_json::{Value, json};
use tokio::sync::Notify;

pub const ACCOUNT: &str = "0x52908400098527886e0f7030069857d2e4169ee7";
pub const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const EXPECTED_CHAIN: u64 = 0x1a4;

/// A valid record: `{name: "Ada Lovelace", tagline: "Engineer at Acme"}`.
#[must_use]
pub fn ada() -> IdentityRecord {
    let mut record = IdentityRecord::empty();
    record.name = "Ada Lovelace".to_string();
    record.tagline = Some("Engineer at Acme".to_string());
    record
}

/// ABI-encode a string return value.
#[must_use]
pub fn encode_string(s: &str) -> String {
    format!(
        "0x{:0>64}{:0>64x}{}",
        "20",
        s.len(),
        hex_padded(s.as_bytes())
    )
}

fn hex_padded(bytes: &[u8]) -> String {
    let mut out = hex::encode(bytes);
    while out.len() % 64 != 0 {
        out.push('0');
    }
    out
}

// =============================================================================
// Gate
// =============================================================================

/// Holds a fake call open until the test releases it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until the gated call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the gated call finish.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

// =============================================================================
// FakeStore
// =============================================================================

/// In-memory content store returning a scripted id.
pub struct FakeStore {
    outcome: Mutex<Result<ContentId, StoreError>>,
    records: Mutex<HashMap<ContentId, IdentityRecord>>,
    store_calls: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl FakeStore {
    /// Every write succeeds with `cid`.
    #[must_use]
    pub fn returning(cid: &str) -> Self {
        Self {
            outcome: Mutex::new(Ok(ContentId::parse(cid).unwrap())),
            records: Mutex::new(HashMap::new()),
            store_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Every write fails as if the store were unreachable.
    #[must_use]
    pub fn unreachable() -> Self {
        let store = Self::returning("unused");
        *store.outcome.lock().unwrap() = Err(StoreError::Unavailable {
            store: "fake",
            reason: "connection refused".to_string(),
        });
        store
    }

    /// Hold every write open until released through the returned gate.
    #[must_use]
    pub fn gated(mut self) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Succeed with `cid` from now on.
    pub fn then_return(&self, cid: &str) {
        *self.outcome.lock().unwrap() = Ok(ContentId::parse(cid).unwrap());
    }

    #[must_use]
    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn store(
        &self,
        record: &IdentityRecord,
        _image: Option<ImageBlob>,
    ) -> Result<ContentId, StoreError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        let cid = self.outcome.lock().unwrap().clone()?;
        let stored = IdentityRecord::from_stored_data(record.to_storable_form());
        self.records.lock().unwrap().insert(cid.clone(), stored);
        Ok(cid)
    }

    async fn retrieve(&self, cid: &ContentId) -> Result<IdentityRecord, StoreError> {
        self.records
            .lock()
            .unwrap()
            .get(cid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                store: "fake",
                cid: cid.clone(),
            })
    }
}

/// Shares one [`FakeStore`] between a test and a store wrapper.
pub struct SharedStore(pub Arc<FakeStore>);

#[async_trait]
impl ContentStore for SharedStore {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    async fn store(
        &self,
        record: &IdentityRecord,
        image: Option<ImageBlob>,
    ) -> Result<ContentId, StoreError> {
        self.0.store(record, image).await
    }

    async fn retrieve(&self, cid: &ContentId) -> Result<IdentityRecord, StoreError> {
        self.0.retrieve(cid).await
    }
}

// =============================================================================
// FakeWallet
// =============================================================================

/// Stateful wallet backed by an in-memory registry.
///
/// Transactions confirm immediately with a `CardUploaded` log, and `eth_call`
/// answers from the entries written so far.
pub struct FakeWallet {
    accounts: Mutex<Vec<String>>,
    chain: Mutex<u64>,
    known_chains: Mutex<HashSet<u64>>,
    refuse_switch: bool,
    refuse_add: bool,
    send_error: Mutex<Option<ProviderError>>,
    registry: Mutex<HashMap<String, String>>,
    receipts: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl FakeWallet {
    /// One authorized account, already on the expected chain.
    #[must_use]
    pub fn on_expected_chain() -> Self {
        Self::on_chain(EXPECTED_CHAIN)
    }

    /// One authorized account on `chain`. Only mainnet and `chain` are known.
    #[must_use]
    pub fn on_chain(chain: u64) -> Self {
        Self {
            accounts: Mutex::new(vec![ACCOUNT.to_string()]),
            chain: Mutex::new(chain),
            known_chains: Mutex::new(HashSet::from([1, chain])),
            refuse_switch: false,
            refuse_add: false,
            send_error: Mutex::new(None),
            registry: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Refuse both switching and registering chains.
    #[must_use]
    pub fn stubborn(mut self) -> Self {
        self.refuse_switch = true;
        self.refuse_add = true;
        self
    }

    /// Fail every `eth_sendTransaction` with `error` until [`FakeWallet::heal`].
    pub fn reject_sends(&self, error: ProviderError) {
        *self.send_error.lock().unwrap() = Some(error);
    }

    pub fn heal(&self) {
        *self.send_error.lock().unwrap() = None;
    }

    pub fn set_chain(&self, chain: u64) {
        *self.chain.lock().unwrap() = chain;
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        *self.accounts.lock().unwrap() = accounts.iter().map(ToString::to_string).collect();
    }

    #[must_use]
    pub fn chain(&self) -> u64 {
        *self.chain.lock().unwrap()
    }

    /// Methods requested so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    fn rpc_error(code: i64, message: &str) -> ProviderError {
        ProviderError::Rpc {
            code,
            message: message.to_string(),
        }
    }

    fn switch(&self, params: &Value) -> Result<Value, ProviderError> {
        if self.refuse_switch {
            return Err(Self::rpc_error(
                ProviderError::UNRECOGNIZED_CHAIN,
                "Unrecognized chain ID",
            ));
        }
        let target = parse_chain(params);
        if self.known_chains.lock().unwrap().contains(&target) {
            self.set_chain(target);
            Ok(Value::Null)
        } else {
            Err(Self::rpc_error(
                ProviderError::UNRECOGNIZED_CHAIN,
                "Unrecognized chain ID",
            ))
        }
    }

    fn add_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        if self.refuse_add {
            return Err(Self::rpc_error(
                ProviderError::USER_REJECTED,
                "User rejected the request",
            ));
        }
        self.known_chains.lock().unwrap().insert(parse_chain(params));
        Ok(Value::Null)
    }

    fn send(&self, params: &Value) -> Result<Value, ProviderError> {
        if let Some(error) = self.send_error.lock().unwrap().clone() {
            return Err(error);
        }

        let tx = &params[0];
        let from = tx["from"].as_str().unwrap().to_string();
        let data = tx["data"].as_str().unwrap();
        // Event data is the calldata without its selector.
        let event_data = format!("0x{}", &data[10..]);
        let cid = abi::decode_string(&event_data).unwrap();
        self.registry.lock().unwrap().insert(from.clone(), cid);

        let mut receipts = self.receipts.lock().unwrap();
        let n = receipts.len() + 1;
        let hash = format!("0x{n:064x}");
        receipts.insert(
            hash.clone(),
            json!({
                "transactionHash": hash,
                "blockNumber": format!("{:#x}", 100 + n),
                "status": "0x1",
                "logs": [{
                    "address": tx["to"],
                    "topics": [abi::CARD_UPLOADED_TOPIC, format!("0x{:0>64}", &from[2..])],
                    "data": event_data,
                }],
            }),
        );
        Ok(json!(hash))
    }

    fn call(&self, params: &Value) -> Value {
        let call = &params[0];
        let data = call["data"].as_str().unwrap();
        let user = if data.starts_with("0xf26d54be") {
            format!("0x{}", &data[data.len() - 40..])
        } else {
            call["from"].as_str().unwrap_or_default().to_string()
        };
        let cid = self
            .registry
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .unwrap_or_default();
        json!(encode_string(&cid))
    }
}

fn parse_chain(params: &Value) -> u64 {
    let hex = params[0]["chainId"].as_str().unwrap();
    u64::from_str_radix(hex.trim_start_matches("0x"), 16).unwrap()
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(method.to_string());
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(self.accounts.lock().unwrap().clone())),
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain()))),
            "wallet_switchEthereumChain" => self.switch(&params),
            "wallet_addEthereumChain" => self.add_chain(&params),
            "eth_sendTransaction" => self.send(&params),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap();
                Ok(self
                    .receipts
                    .lock()
                    .unwrap()
                    .get(hash)
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            "eth_call" => Ok(self.call(&params)),
            other => Err(Self::rpc_error(-32601, &format!("method {other} not found"))),
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Orchestrator wired to a fake wallet and a fake store.
pub struct Harness {
    pub wallet: Arc<FakeWallet>,
    pub store: Arc<FakeStore>,
    pub ledger: ConnectionManager,
    pub registry: RegistryClient,
    pub orchestrator: UploadOrchestrator,
}

impl Harness {
    #[must_use]
    pub fn new(wallet: FakeWallet, store: FakeStore) -> Self {
        Self::with_store(wallet, Arc::new(store), |store| store as Arc<dyn ContentStore>)
    }

    /// Wire the orchestrator to a store derived from the fake, e.g. a fallback wrapper.
    pub fn with_store<F>(wallet: FakeWallet, store: Arc<FakeStore>, wrap: F) -> Self
    where
        F: FnOnce(Arc<FakeStore>) -> Arc<dyn ContentStore>,
    {
        let wallet = Arc::new(wallet);
        let provider: Arc<dyn WalletProvider> = wallet.clone();
        let ledger = ConnectionManager::new(
            Some(provider),
            ChainConfig::monad_testnet(),
            Duration::from_millis(10),
        );
        let registry = RegistryClient::new(
            Address::parse(CONTRACT).unwrap(),
            Duration::from_secs(5),
            Duration::from_millis(10),
        );
        let orchestrator = UploadOrchestrator::new(
            wrap(Arc::clone(&store)),
            ledger.clone(),
            registry.clone(),
            Duration::from_secs(5),
        );

        Self {
            wallet,
            store,
            ledger,
            registry,
            orchestrator,
        }
    }
}
