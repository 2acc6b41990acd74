//! Typed client for the on-chain card registry.
//!
//! The registry maps each address to at most one content id. Writes are
//! scoped to the signing account and overwrite any previous entry; reads
//! return an empty string when the address has no entry, surfaced here as
//! `None`.

pub mod abi;

use std::time::Duration;

use bemember_core::{Address, ContentId, TxHash};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::ledger::{Connection, LedgerError};

/// Inclusion acknowledgment for a registry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub from: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct LogEntry {
    #[serde(default)]
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

/// Client for the registry contract at a fixed address.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    contract: Address,
    confirmation_timeout: Duration,
    receipt_poll: Duration,
}

impl RegistryClient {
    #[must_use]
    pub const fn new(contract: Address, confirmation_timeout: Duration, receipt_poll: Duration) -> Self {
        Self {
            contract,
            confirmation_timeout,
            receipt_poll,
        }
    }

    #[must_use]
    pub const fn contract(&self) -> &Address {
        &self.contract
    }

    /// Write `cid` as the signer's entry and wait for inclusion.
    ///
    /// Repeated submissions overwrite the previous entry.
    ///
    /// # Errors
    ///
    /// - `Rejected` if the wallet refuses to send or the transaction reverts
    /// - `Timeout` if no receipt appears within the confirmation budget
    #[instrument(skip(self, connection), fields(contract = %self.contract, cid = %cid))]
    pub async fn submit(
        &self,
        connection: &Connection,
        cid: &ContentId,
    ) -> Result<Confirmation, LedgerError> {
        let from = connection.current_address().await?;
        let tx = json!({
            "from": from.as_str(),
            "to": self.contract.as_str(),
            "data": abi::encode_upload_card(cid.as_str()),
        });

        let hash = match connection.request("eth_sendTransaction", json!([tx])).await {
            Ok(value) => parse_tx_hash(&value)?,
            Err(LedgerError::Rpc { source, .. }) => {
                return Err(LedgerError::Rejected {
                    reason: source.to_string(),
                    tx: None,
                });
            }
            Err(e) => return Err(e),
        };
        info!(tx = %hash, "Registry write broadcast, waiting for confirmation");

        let receipt = tokio::time::timeout(
            self.confirmation_timeout,
            self.wait_for_receipt(connection, &hash),
        )
        .await
        .map_err(|_| LedgerError::Timeout {
            stage: "ledger_confirmation",
            after: self.confirmation_timeout,
        })?;

        if receipt.status.as_deref() == Some("0x0") {
            return Err(LedgerError::Rejected {
                reason: "transaction reverted".to_string(),
                tx: Some(hash),
            });
        }

        self.check_event(&receipt, &from, cid);

        let block_number = receipt.block_number.as_deref().and_then(parse_quantity);
        info!(tx = %hash, block = ?block_number, "Registry write confirmed");
        Ok(Confirmation {
            tx_hash: hash,
            block_number,
            from,
        })
    }

    /// Read the content id registered for `user`.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails or the result is not an ABI string.
    #[instrument(skip(self, connection), fields(user = %user))]
    pub async fn read_for(
        &self,
        connection: &Connection,
        user: &Address,
    ) -> Result<Option<ContentId>, LedgerError> {
        let call = json!({
            "to": self.contract.as_str(),
            "data": abi::encode_get_card_cid(user),
        });
        self.call(connection, call).await
    }

    /// Read the content id registered for the connected account.
    ///
    /// # Errors
    ///
    /// Returns `NoAccount` if no account is authorized, or error if the call fails.
    #[instrument(skip_all)]
    pub async fn read_own(&self, connection: &Connection) -> Result<Option<ContentId>, LedgerError> {
        let from = connection.current_address().await?;
        let call = json!({
            "from": from.as_str(),
            "to": self.contract.as_str(),
            "data": abi::encode_my_card_cid(),
        });
        self.call(connection, call).await
    }

    async fn call(
        &self,
        connection: &Connection,
        call: Value,
    ) -> Result<Option<ContentId>, LedgerError> {
        let value = connection
            .request("eth_call", json!([call, "latest"]))
            .await?;
        let invalid = |reason: String| LedgerError::InvalidResponse {
            method: "eth_call",
            reason,
        };

        let data = value
            .as_str()
            .ok_or_else(|| invalid(format!("expected hex data, got {value}")))?;
        let raw = abi::decode_string(data).map_err(|e| invalid(e.to_string()))?;
        let cid = ContentId::from_opaque(raw);
        if cid.is_none() {
            debug!("No registry entry");
        }
        Ok(cid)
    }

    async fn wait_for_receipt(&self, connection: &Connection, hash: &TxHash) -> TransactionReceipt {
        loop {
            match connection
                .request("eth_getTransactionReceipt", json!([hash.as_str()]))
                .await
            {
                Ok(Value::Null) => {}
                Ok(value) => match serde_json::from_value::<TransactionReceipt>(value) {
                    Ok(receipt) => return receipt,
                    Err(e) => warn!(error = %e, "Ignoring malformed receipt"),
                },
                Err(e) => warn!(error = %e, "Receipt poll failed"),
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }

    /// Warn if the receipt lacks the expected `CardUploaded` event.
    fn check_event(&self, receipt: &TransactionReceipt, from: &Address, cid: &ContentId) {
        let event = receipt
            .logs
            .iter()
            .filter(|log| log.address.eq_ignore_ascii_case(self.contract.as_str()))
            .find_map(|log| abi::decode_card_uploaded(&log.topics, &log.data).ok().flatten());

        match event {
            Some(event) if event.user == *from && event.cid == cid.as_str() => {}
            Some(event) => warn!(
                emitted_user = %event.user,
                emitted_cid = %event.cid,
                "CardUploaded event does not match submission"
            ),
            None => warn!("Receipt carries no CardUploaded event"),
        }
    }
}

fn parse_tx_hash(value: &Value) -> Result<TxHash, LedgerError> {
    let invalid = |reason: String| LedgerError::InvalidResponse {
        method: "eth_sendTransaction",
        reason,
    };
    let s = value
        .as_str()
        .ok_or_else(|| invalid(format!("expected a transaction hash, got {value}")))?;
    TxHash::parse(s).map_err(|e| invalid(e.to_string()))
}

fn parse_quantity(s: &str) -> Option<u64> {
    u64::from_str_radix(s.strip_prefix("0x")?, 16).ok()
}
