//! # Wallet Provider
//!
//! The EIP-1193-shaped seam between the client and whatever holds the
//! user's keys: a single `request(method, params)` call returning a JSON
//! value or a provider error carrying `code`, `message` and optional `data`.
//!
//! [`HttpProvider`] implements the seam over JSON-RPC/HTTP against a node or
//! signer service that manages the account (a local Hardhat node exposes
//! unlocked accounts this way). Read-only methods retry unreachable
//! endpoints and transient HTTP statuses; prompts and transaction
//! submission are sent exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::retry::{send_with_retry, RetryPolicy};

/// EIP-1193 code: the user rejected the request.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-3326 code: the requested chain has not been added to the wallet.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Methods that prompt the user or change ledger state. Never retried.
const NON_IDEMPOTENT_METHODS: &[&str] = &[
    "eth_requestAccounts",
    "eth_sendTransaction",
    "wallet_switchEthereumChain",
    "wallet_addEthereumChain",
];

/// Errors returned by a [`WalletProvider`].
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The provider could not be reached at all.
    #[error("wallet provider unreachable: {0}")]
    Transport(String),

    /// The provider answered with an error object.
    #[error("provider error {code}: {message}")]
    Rpc {
        /// Numeric error code.
        code: i64,
        /// Human-readable message.
        message: String,
        /// Optional payload (revert data for failed calls).
        data: Option<Value>,
    },

    /// The provider answered with something that is not JSON-RPC.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// The error code, if the provider sent one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the user declined the prompt.
    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED_CODE)
    }
}

/// An EIP-1193-style request interface to a wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Send a single request and return its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// JSON-RPC over HTTP wallet provider.
#[derive(Debug)]
pub struct HttpProvider {
    client: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
    retry: RetryPolicy,
}

impl HttpProvider {
    /// Create a provider for `url` with a per-request timeout.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
            retry: RetryPolicy::default(),
        })
    }

    /// Backoff applied to read-only methods.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// The endpoint this provider talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::Response, reqwest::Error> {
        let policy = if NON_IDEMPOTENT_METHODS.contains(&method) {
            RetryPolicy::NONE
        } else {
            self.retry
        };
        send_with_retry(method, policy, || {
            self.client.post(self.url.clone()).json(body).send()
        })
        .await
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        tracing::debug!(method, id, "JSON-RPC request");

        let resp = self.post(method, &body).await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Transport(format!("{method}: request timed out"))
            } else {
                ProviderError::Transport(format!("{method}: {e}"))
            }
        })?;

        if !resp.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "{method}: HTTP {}",
                resp.status()
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{method}: {e}")))?;

        parse_response(method, json)
    }
}

/// Split a JSON-RPC response envelope into its result or error.
pub(crate) fn parse_response(method: &str, json: Value) -> Result<Value, ProviderError> {
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown RPC error")
            .to_string();
        return Err(ProviderError::Rpc {
            code,
            message,
            data: error.get("data").cloned(),
        });
    }

    json.get("result").cloned().ok_or_else(|| {
        ProviderError::InvalidResponse(format!("{method}: response missing 'result' field"))
    })
}
