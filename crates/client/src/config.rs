//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required for ledger operations
//! - `BEMEMBER_CONTRACT_ADDRESS` - Deployed registry contract address
//!
//! ## Optional
//! - `BEMEMBER_WALLET_URL` - Wallet JSON-RPC endpoint (absent: no wallet available)
//! - `BEMEMBER_CHAIN_ID` - Expected chain id, decimal or 0x-hex (default: 0x1a4)
//! - `BEMEMBER_CHAIN_NAME` - Chain display name (default: Monad Testnet)
//! - `BEMEMBER_RPC_URL` - Public RPC endpoint registered with the wallet
//! - `BEMEMBER_EXPLORER_URL` - Block explorer base URL
//! - `BEMEMBER_CURRENCY_NAME` / `BEMEMBER_CURRENCY_SYMBOL` - Native currency (default: MON)
//! - `IPFS_API_URL` - IPFS HTTP API (default: <https://ipfs.infura.io:5001/api/v0>)
//! - `IPFS_GATEWAY_URL` - Read gateway (default: <https://ipfs.io/ipfs>)
//! - `INFURA_PROJECT_ID` / `INFURA_PROJECT_SECRET` - IPFS write credentials (both or neither)
//! - `BEMEMBER_STORE_TIMEOUT_SECS` - Content store cap (default: 30)
//! - `BEMEMBER_CONFIRMATION_TIMEOUT_SECS` - Ledger confirmation cap (default: 120)
//! - `BEMEMBER_RECEIPT_POLL_MS` - Receipt polling interval (default: 1500)
//! - `BEMEMBER_WATCH_INTERVAL_MS` - Wallet event polling interval (default: 2000)
//! - `BEMEMBER_SHARE_BASE_URL` - Public card page base (default: <https://bemember.app>)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::time::Duration;

use bemember_core::{Address, ChainId, TxHash};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Chain the registry is deployed on
    pub chain: ChainConfig,
    /// Registry contract address
    pub contract_address: Option<Address>,
    /// Wallet JSON-RPC endpoint
    pub wallet_url: Option<Url>,
    /// Content store configuration
    pub ipfs: IpfsConfig,
    /// Suspension point caps and polling intervals
    pub timeouts: Timeouts,
    /// Base URL of the public card page
    pub share_base_url: Url,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Expected chain and the metadata needed to register it with a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub rpc_url: Url,
    pub explorer_url: Url,
    pub currency: NativeCurrency,
}

/// Native currency metadata for chain registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// IPFS content store configuration.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// HTTP API base (writes)
    pub api_url: Url,
    /// Public gateway base (reads)
    pub gateway_url: Url,
    /// Write credentials; reads never need them
    pub credentials: Option<IpfsCredentials>,
}

/// IPFS project credentials.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct IpfsCredentials {
    pub project_id: String,
    pub project_secret: SecretString,
}

impl std::fmt::Debug for IpfsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpfsCredentials")
            .field("project_id", &self.project_id)
            .field("project_secret", &"[REDACTED]")
            .finish()
    }
}

/// Caps for the suspension points and polling intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Cap on a whole content store call
    pub store: Duration,
    /// Cap on waiting for ledger inclusion
    pub confirmation: Duration,
    /// Receipt polling interval
    pub receipt_poll: Duration,
    /// Wallet event polling interval
    pub watch_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_secs(30),
            confirmation: Duration::from_secs(120),
            receipt_poll: Duration::from_millis(1500),
            watch_interval: Duration::from_millis(2000),
        }
    }
}

impl Timeouts {
    /// Cap on a single content store HTTP request.
    ///
    /// A write with an image makes two sequential requests; both must fit
    /// within `store`.
    #[must_use]
    pub fn store_request(&self) -> Duration {
        self.store / 2
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or a secret fails
    /// validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let contract_address = env
            .optional("BEMEMBER_CONTRACT_ADDRESS")
            .map(|v| {
                Address::parse(&v).map_err(|e| {
                    ConfigError::InvalidEnvVar("BEMEMBER_CONTRACT_ADDRESS".to_string(), e.to_string())
                })
            })
            .transpose()?;
        let wallet_url = env
            .optional("BEMEMBER_WALLET_URL")
            .map(|v| parse_url("BEMEMBER_WALLET_URL", &v))
            .transpose()?;

        Ok(Self {
            chain: ChainConfig::from_env(&env)?,
            contract_address,
            wallet_url,
            ipfs: IpfsConfig::from_env(&env)?,
            timeouts: Timeouts::from_env(&env)?,
            share_base_url: env.url_or_default("BEMEMBER_SHARE_BASE_URL", "https://bemember.app")?,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }

    /// The registry contract address, required for any ledger operation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if it was not configured.
    pub fn require_contract(&self) -> Result<&Address, ConfigError> {
        self.contract_address
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("BEMEMBER_CONTRACT_ADDRESS".to_string()))
    }

    /// Public card page for a wallet address.
    #[must_use]
    pub fn share_url(&self, address: &Address) -> String {
        format!(
            "{}/card/{address}",
            self.share_base_url.as_str().trim_end_matches('/')
        )
    }
}

impl ChainConfig {
    /// Monad testnet, the chain the registry is deployed on by default.
    ///
    /// # Panics
    ///
    /// Never: the URLs are compile-time constants.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn monad_testnet() -> Self {
        Self {
            chain_id: ChainId::new(0x1a4),
            chain_name: "Monad Testnet".to_string(),
            rpc_url: Url::parse("https://testnet-rpc.monad.xyz").unwrap(),
            explorer_url: Url::parse("https://testnet-explorer.monad.xyz").unwrap(),
            currency: NativeCurrency {
                name: "MON".to_string(),
                symbol: "MON".to_string(),
                decimals: 18,
            },
        }
    }

    /// Parameters for `wallet_addEthereumChain`.
    #[must_use]
    pub fn to_add_chain_params(&self) -> Value {
        json!({
            "chainId": self.chain_id.to_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.currency.name,
                "symbol": self.currency.symbol,
                "decimals": self.currency.decimals,
            },
            "rpcUrls": [self.rpc_url.as_str()],
            "blockExplorerUrls": [self.explorer_url.as_str()],
        })
    }

    /// Explorer page for a transaction.
    #[must_use]
    pub fn explorer_tx_url(&self, tx: &TxHash) -> String {
        format!(
            "{}/tx/{tx}",
            self.explorer_url.as_str().trim_end_matches('/')
        )
    }

    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::monad_testnet();
        let chain_id = match env.optional("BEMEMBER_CHAIN_ID") {
            Some(v) => ChainId::parse(&v).map_err(|e| {
                ConfigError::InvalidEnvVar("BEMEMBER_CHAIN_ID".to_string(), e.to_string())
            })?,
            None => defaults.chain_id,
        };

        Ok(Self {
            chain_id,
            chain_name: env.or_default("BEMEMBER_CHAIN_NAME", &defaults.chain_name),
            rpc_url: env.url_or_default("BEMEMBER_RPC_URL", defaults.rpc_url.as_str())?,
            explorer_url: env
                .url_or_default("BEMEMBER_EXPLORER_URL", defaults.explorer_url.as_str())?,
            currency: NativeCurrency {
                name: env.or_default("BEMEMBER_CURRENCY_NAME", &defaults.currency.name),
                symbol: env.or_default("BEMEMBER_CURRENCY_SYMBOL", &defaults.currency.symbol),
                decimals: defaults.currency.decimals,
            },
        })
    }
}

impl IpfsConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let credentials = match (
            env.optional("INFURA_PROJECT_ID"),
            env.optional("INFURA_PROJECT_SECRET"),
        ) {
            (Some(project_id), Some(secret)) => {
                validate_secret_strength(&secret, "INFURA_PROJECT_SECRET")?;
                Some(IpfsCredentials {
                    project_id,
                    project_secret: SecretString::from(secret),
                })
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar(
                    "INFURA_PROJECT_SECRET".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("INFURA_PROJECT_ID".to_string()));
            }
        };

        Ok(Self {
            api_url: env.url_or_default("IPFS_API_URL", "https://ipfs.infura.io:5001/api/v0")?,
            gateway_url: env.url_or_default("IPFS_GATEWAY_URL", "https://ipfs.io/ipfs")?,
            credentials,
        })
    }

    /// Whether uploads can use the primary store.
    #[must_use]
    pub const fn can_write(&self) -> bool {
        self.credentials.is_some()
    }

    /// Basic-auth pair for uploads.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|c| (c.project_id.as_str(), c.project_secret.expose_secret()))
    }
}

impl Timeouts {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            store: env
                .u64_or("BEMEMBER_STORE_TIMEOUT_SECS", defaults.store.as_secs())
                .map(Duration::from_secs)?,
            confirmation: env
                .u64_or(
                    "BEMEMBER_CONFIRMATION_TIMEOUT_SECS",
                    defaults.confirmation.as_secs(),
                )
                .map(Duration::from_secs)?,
            receipt_poll: env
                .u64_or("BEMEMBER_RECEIPT_POLL_MS", 1500)
                .map(Duration::from_millis)?,
            watch_interval: env
                .u64_or("BEMEMBER_WATCH_INTERVAL_MS", 2000)
                .map(Duration::from_millis)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the typed accessors used above.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn url_or_default(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        parse_url(key, &self.or_default(key, default))
    }

    fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        self.optional(key).map_or(Ok(default), |v| {
            v.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
