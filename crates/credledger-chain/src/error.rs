//! Chain connector and contract gateway error types.

use credledger_core::TxHash;
use serde_json::Value;
use thiserror::Error;

use crate::abi::{decode_revert_reason, from_hex_data, AbiError};
use crate::provider::ProviderError;

/// Errors establishing a wallet session.
#[derive(Error, Debug, Clone)]
pub enum ConnectError {
    /// No wallet is configured, or it could not be reached.
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// The user declined the account or network prompt.
    #[error("request rejected in wallet")]
    UserRejected,

    /// The wallet is on another network and could not be switched.
    #[error("wallet is not on network {expected_chain_id:#x}: {reason}")]
    NetworkMismatch {
        /// The chain id the client requires.
        expected_chain_id: u64,
        /// Why switching or adding the network failed.
        reason: String,
    },

    /// A wallet prompt did not complete within the configured bound.
    #[error("wallet did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

impl ConnectError {
    /// Actionable text for the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            Self::WalletUnavailable(_) => {
                "No wallet is reachable. Check that your wallet or node is running and the RPC URL is correct.".to_string()
            }
            Self::UserRejected => {
                "The request was declined in your wallet. Approve the connection to continue.".to_string()
            }
            Self::NetworkMismatch {
                expected_chain_id, ..
            } => format!(
                "Your wallet is on the wrong network. Switch it to chain id {expected_chain_id} and try again."
            ),
            Self::Timeout(_) => {
                "Your wallet did not answer in time. Unlock it and try again.".to_string()
            }
        }
    }
}

/// Errors reading from or writing to the ledger.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger rejected a call or transaction before inclusion.
    #[error("{operation} rejected by ledger: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Rejected {
        /// The contract operation that was attempted.
        operation: String,
        /// Revert reason, when the ledger supplied one.
        reason: Option<String>,
    },

    /// An included transaction reverted.
    #[error("transaction {tx_hash} reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted {
        /// The reverted transaction.
        tx_hash: TxHash,
        /// Revert reason, when it could be recovered.
        reason: Option<String>,
    },

    /// The ledger answered with data that does not match the interface.
    #[error("malformed response to {operation}: {detail}")]
    Decode {
        /// The contract operation whose response failed to decode.
        operation: String,
        /// What was wrong.
        detail: String,
    },

    /// The session this call was bound to has been disconnected.
    #[error("session disconnected")]
    Disconnected,
}

impl ChainError {
    /// The revert reason carried by this error, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason, .. } | Self::Reverted { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn decode(operation: &str, err: AbiError) -> Self {
        Self::Decode {
            operation: operation.to_string(),
            detail: err.to_string(),
        }
    }

    /// Map a provider failure during `operation`.
    ///
    /// Error objects become [`ChainError::Rejected`] with the revert reason
    /// recovered from the `data` payload when present.
    pub(crate) fn from_provider(operation: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::Transport(msg) => Self::Unavailable(msg),
            ProviderError::InvalidResponse(detail) => Self::Decode {
                operation: operation.to_string(),
                detail,
            },
            ProviderError::Rpc { message, data, .. } => Self::Rejected {
                operation: operation.to_string(),
                reason: data
                    .as_ref()
                    .and_then(revert_reason_from_data)
                    .or_else(|| reason_from_message(&message)),
            },
        }
    }
}

/// Find an `Error(string)` payload in an RPC error's `data` field.
///
/// Nodes disagree on the shape: some send the hex string directly, some
/// nest it under `data` (or `data.data`).
fn revert_reason_from_data(data: &Value) -> Option<String> {
    match data {
        Value::String(hex) => from_hex_data(hex)
            .ok()
            .and_then(|bytes| decode_revert_reason(&bytes)),
        Value::Object(map) => map.get("data").and_then(revert_reason_from_data),
        _ => None,
    }
}

fn reason_from_message(message: &str) -> Option<String> {
    const MARKERS: [&str; 2] = ["reverted with reason string '", "execution reverted: "];
    for marker in MARKERS {
        if let Some(idx) = message.find(marker) {
            let rest = &message[idx + marker.len()..];
            return Some(rest.trim_end_matches('\'').to_string());
        }
    }
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}
