//! # Chain Connector
//!
//! Establishes an authenticated [`Session`] with the user's wallet:
//!
//! 1. Request account access (`eth_requestAccounts`, falling back to
//!    `eth_accounts` for plain nodes that do not implement the prompt).
//! 2. Read the wallet's chain id.
//! 3. If it differs from the configured network, ask the wallet to switch.
//!    A wallet that does not know the network (code 4902) is asked to add
//!    it, then to switch again.
//!
//! The session carries the connected address and a [`Signer`] that sends
//! transactions and waits for their inclusion. Disconnecting a session makes
//! every further signer call fail with [`ChainError::Disconnected`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use credledger_core::{Address, TxHash};
use serde_json::{json, Value};

use crate::abi::{from_hex_data, parse_quantity, quantity, to_hex_data};
use crate::config::{LedgerConfig, NetworkConfig};
use crate::error::{ChainError, ConnectError};
use crate::ledger::TxReceipt;
use crate::provider::{HttpProvider, ProviderError, WalletProvider, UNRECOGNIZED_CHAIN_CODE};

const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Connects to a wallet and ensures it is on the configured network.
pub struct ChainConnector {
    provider: Arc<dyn WalletProvider>,
    network: NetworkConfig,
    prompt_timeout: Option<Duration>,
}

impl fmt::Debug for ChainConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConnector")
            .field("network", &self.network)
            .field("prompt_timeout", &self.prompt_timeout)
            .finish_non_exhaustive()
    }
}

impl ChainConnector {
    pub fn new(provider: Arc<dyn WalletProvider>, network: NetworkConfig) -> Self {
        Self {
            provider,
            network,
            prompt_timeout: None,
        }
    }

    /// Build a connector over HTTP from configuration.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConnectError> {
        let provider = HttpProvider::new(config.wallet_url.clone(), config.timeout())
            .map_err(|e| ConnectError::WalletUnavailable(e.to_string()))?
            .with_retry_policy(config.retry);
        Ok(Self::new(Arc::new(provider), config.network.clone())
            .with_prompt_timeout(config.prompt_timeout))
    }

    /// Bound every wallet prompt by `limit`.
    pub fn with_prompt_timeout(mut self, limit: Option<Duration>) -> Self {
        self.prompt_timeout = limit;
        self
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Connect to the wallet.
    pub async fn connect(&self) -> Result<Session, ConnectError> {
        let address = self.request_account().await?;
        tracing::info!(address = %address, "wallet account granted");

        let chain_id = self.current_chain_id().await?;
        if chain_id != self.network.chain_id {
            tracing::info!(
                current = chain_id,
                expected = self.network.chain_id,
                "wallet on another network, requesting switch"
            );
            self.switch_network().await?;
            let switched = self.current_chain_id().await?;
            if switched != self.network.chain_id {
                return Err(self.mismatch(format!(
                    "wallet reports chain id {switched} after switching"
                )));
            }
        }

        Ok(Session::new(
            Arc::clone(&self.provider),
            address,
            self.network.chain_id,
        ))
    }

    async fn request_account(&self) -> Result<Address, ConnectError> {
        let accounts = match self.prompt("eth_requestAccounts", json!([])).await? {
            Err(err) if err.code() == Some(METHOD_NOT_FOUND_CODE) => {
                self.prompt("eth_accounts", json!([])).await?
            }
            other => other,
        }
        .map_err(|err| {
            if err.is_user_rejection() {
                ConnectError::UserRejected
            } else {
                ConnectError::WalletUnavailable(err.to_string())
            }
        })?;

        let first = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectError::WalletUnavailable("wallet exposed no accounts".into()))?;
        Address::parse(first).map_err(|e| ConnectError::WalletUnavailable(e.to_string()))
    }

    async fn current_chain_id(&self) -> Result<u64, ConnectError> {
        let raw = self
            .prompt("eth_chainId", json!([]))
            .await?
            .map_err(|e| ConnectError::WalletUnavailable(e.to_string()))?;
        raw.as_str()
            .and_then(|s| parse_quantity(s).ok())
            .ok_or_else(|| ConnectError::WalletUnavailable(format!("unreadable chain id {raw}")))
    }

    async fn switch_network(&self) -> Result<(), ConnectError> {
        let switch_params = json!([{ "chainId": self.network.chain_id_hex() }]);
        match self
            .prompt("wallet_switchEthereumChain", switch_params.clone())
            .await?
        {
            Ok(_) => Ok(()),
            Err(err) if err.code() == Some(UNRECOGNIZED_CHAIN_CODE) => {
                tracing::info!(chain = %self.network.chain_name, "network unknown to wallet, adding it");
                self.prompt("wallet_addEthereumChain", self.network.add_chain_params())
                    .await?
                    .map_err(|e| self.network_failure(e))?;
                self.prompt("wallet_switchEthereumChain", switch_params)
                    .await?
                    .map(|_| ())
                    .map_err(|e| self.network_failure(e))
            }
            Err(err) => Err(self.network_failure(err)),
        }
    }

    /// Send a prompt, bounded by the prompt timeout. The outer error is the
    /// timeout; the inner result is the provider's answer.
    async fn prompt(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Result<Value, ProviderError>, ConnectError> {
        let call = self.provider.request(method, params);
        match self.prompt_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ConnectError::Timeout(limit)),
            None => Ok(call.await),
        }
    }

    fn network_failure(&self, err: ProviderError) -> ConnectError {
        match err {
            err if err.is_user_rejection() => ConnectError::UserRejected,
            ProviderError::Transport(msg) => ConnectError::WalletUnavailable(msg),
            other => self.mismatch(other.to_string()),
        }
    }

    fn mismatch(&self, reason: String) -> ConnectError {
        ConnectError::NetworkMismatch {
            expected_chain_id: self.network.chain_id,
            reason,
        }
    }
}

/// An authenticated wallet session.
///
/// Cheap to clone; clones share the same connection state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Arc<dyn WalletProvider>,
    address: Address,
    chain_id: u64,
    active: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.inner.address)
            .field("chain_id", &self.inner.chain_id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(provider: Arc<dyn WalletProvider>, address: Address, chain_id: u64) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                provider,
                address,
                chain_id,
                active: AtomicBool::new(true),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// End the session. Outstanding signers stop working.
    pub fn disconnect(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            tracing::info!(address = %self.inner.address, "wallet session disconnected");
        }
    }

    /// The signing handle for this session.
    pub fn signer(&self) -> Signer {
        Signer {
            session: self.clone(),
        }
    }
}

/// Sends calls and transactions from the session's account.
#[derive(Debug, Clone)]
pub struct Signer {
    session: Session,
}

impl Signer {
    pub fn address(&self) -> Address {
        self.session.address()
    }

    async fn request(&self, operation: &str, method: &str, params: Value) -> Result<Value, ChainError> {
        if !self.session.is_active() {
            return Err(ChainError::Disconnected);
        }
        self.session
            .inner
            .provider
            .request(method, params)
            .await
            .map_err(|e| ChainError::from_provider(operation, e))
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, to: &Address, data: &[u8], operation: &str) -> Result<Vec<u8>, ChainError> {
        let params = json!([
            { "from": self.address().to_hex(), "to": to.to_hex(), "data": to_hex_data(data) },
            "latest"
        ]);
        let raw = self.request(operation, "eth_call", params).await?;
        let hex = raw.as_str().ok_or_else(|| ChainError::Decode {
            operation: operation.to_string(),
            detail: format!("expected hex string, got {raw}"),
        })?;
        from_hex_data(hex).map_err(|e| ChainError::decode(operation, e))
    }

    /// Submit a transaction and return its hash.
    pub async fn send_transaction(
        &self,
        to: &Address,
        data: &[u8],
        operation: &str,
    ) -> Result<TxHash, ChainError> {
        let params = json!([{
            "from": self.address().to_hex(),
            "to": to.to_hex(),
            "data": to_hex_data(data),
        }]);
        let raw = self.request(operation, "eth_sendTransaction", params).await?;
        let hash = raw
            .as_str()
            .and_then(|s| TxHash::parse(s).ok())
            .ok_or_else(|| ChainError::Decode {
                operation: operation.to_string(),
                detail: format!("expected transaction hash, got {raw}"),
            })?;
        tracing::info!(operation, tx_hash = %hash, "transaction submitted");
        Ok(hash)
    }

    /// Poll for the receipt of `tx_hash` until it is included.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        poll_interval: Duration,
    ) -> Result<TxReceipt, ChainError> {
        loop {
            let receipt = self
                .request(
                    "eth_getTransactionReceipt",
                    "eth_getTransactionReceipt",
                    json!([tx_hash.to_hex()]),
                )
                .await?;
            if receipt.is_null() {
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            let block_number = receipt
                .get("blockNumber")
                .and_then(Value::as_str)
                .and_then(|s| parse_quantity(s).ok())
                .ok_or_else(|| ChainError::Decode {
                    operation: "eth_getTransactionReceipt".into(),
                    detail: "receipt has no block number".into(),
                })?;

            let succeeded = match receipt.get("status").and_then(Value::as_str) {
                Some(status) => parse_quantity(status).map(|s| s == 1).unwrap_or(false),
                None => true,
            };
            if !succeeded {
                let reason = self.revert_reason(tx_hash, block_number).await;
                tracing::warn!(tx_hash = %tx_hash, reason = ?reason, "transaction reverted");
                return Err(ChainError::Reverted {
                    tx_hash: *tx_hash,
                    reason,
                });
            }

            tracing::info!(tx_hash = %tx_hash, block_number, "transaction confirmed");
            return Ok(TxReceipt {
                tx_hash: *tx_hash,
                block_number,
            });
        }
    }

    /// Replay a reverted transaction as a call against its parent block to
    /// recover the revert reason.
    async fn revert_reason(&self, tx_hash: &TxHash, block_number: u64) -> Option<String> {
        let tx = self
            .request(
                "eth_getTransactionByHash",
                "eth_getTransactionByHash",
                json!([tx_hash.to_hex()]),
            )
            .await
            .ok()?;
        let params = json!([
            { "from": tx.get("from")?, "to": tx.get("to")?, "data": tx.get("input")? },
            quantity(block_number.saturating_sub(1))
        ]);
        match self.request("replay", "eth_call", params).await {
            Ok(_) => None,
            Err(err) => err.reason().map(str::to_string),
        }
    }

    /// The latest block number.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let raw = self.request("eth_blockNumber", "eth_blockNumber", json!([])).await?;
        raw.as_str()
            .and_then(|s| parse_quantity(s).ok())
            .ok_or_else(|| ChainError::Decode {
                operation: "eth_blockNumber".into(),
                detail: format!("expected quantity, got {raw}"),
            })
    }

    /// `eth_getLogs` with the given filter object.
    pub async fn get_logs(&self, filter: Value) -> Result<Vec<Value>, ChainError> {
        let raw = self.request("eth_getLogs", "eth_getLogs", json!([filter])).await?;
        match raw {
            Value::Array(logs) => Ok(logs),
            other => Err(ChainError::Decode {
                operation: "eth_getLogs".into(),
                detail: format!("expected array, got {other}"),
            }),
        }
    }
}
