//! Wallet provider seam.
//!
//! A wallet provider speaks EIP-1193-style requests: a method name plus JSON
//! params, answered with a JSON result or a coded error. [`HttpWalletProvider`]
//! forwards those requests as JSON-RPC 2.0 over HTTP to a local signer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Errors returned by a wallet provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The wallet answered with a coded error.
    #[error("wallet error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The wallet could not be reached.
    #[error("wallet transport error: {0}")]
    Transport(String),

    /// The wallet answered with something that is not a JSON-RPC response.
    #[error("invalid wallet response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// The chain is not known to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;

    /// Error code, if the wallet supplied one.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_user_rejection(&self) -> bool {
        matches!(self.code(), Some(Self::USER_REJECTED))
    }

    #[must_use]
    pub const fn is_unrecognized_chain(&self) -> bool {
        matches!(self.code(), Some(Self::UNRECOGNIZED_CHAIN))
    }
}

/// A wallet capability that answers EIP-1193 requests.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

// =============================================================================
// HttpWalletProvider
// =============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 2.0 wallet provider over HTTP.
#[derive(Clone)]
pub struct HttpWalletProvider {
    inner: Arc<HttpWalletProviderInner>,
}

struct HttpWalletProviderInner {
    client: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl HttpWalletProvider {
    /// Create a provider for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(endpoint: Url, request_timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(HttpWalletProviderInner {
                client,
                endpoint,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    #[instrument(skip(self, params))]
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() && text.is_empty() {
            return Err(ProviderError::Transport(format!("HTTP {status}")));
        }

        debug!(id, "Wallet responded");
        parse_response(&text)
    }
}

/// Extract the result or coded error from a JSON-RPC response body.
fn parse_response(text: &str) -> Result<Value, ProviderError> {
    let response: RpcResponse = serde_json::from_str(text).map_err(|e| {
        let excerpt: String = text.chars().take(200).collect();
        ProviderError::InvalidResponse(format!("{e}: {excerpt}"))
    })?;

    if let Some(error) = response.error {
        return Err(ProviderError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        let value = parse_response(r#"{"jsonrpc":"2.0","id":1,"result":"0x1a4"}"#).unwrap();
        assert_eq!(value, json!("0x1a4"));
    }

    #[test]
    fn test_parse_null_result() {
        let value = parse_response(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_parse_coded_error() {
        let err = parse_response(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":4902,"message":"Unrecognized chain ID"}}"#,
        )
        .unwrap_err();
        assert!(err.is_unrecognized_chain());
        assert_eq!(err.code(), Some(ProviderError::UNRECOGNIZED_CHAIN));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
        assert_eq!(err.code(), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let provider = HttpWalletProvider::new(
            Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = provider
            .request("eth_chainId", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
