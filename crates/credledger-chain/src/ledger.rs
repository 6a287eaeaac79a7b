//! # Credential Ledger Interface
//!
//! The typed surface every consumer of the credential contract programs
//! against. [`crate::gateway::ContractGateway`] implements it over a wallet
//! session; [`crate::memory::MemoryLedger`] implements it in process with the
//! same rules, for tests and offline demos.
//!
//! Reads reflect the ledger's latest confirmed state. Writes return the
//! transaction hash as soon as the ledger accepts the submission;
//! [`CredentialLedger::wait_for_confirmation`] resolves once it is included.

use async_trait::async_trait;
use credledger_core::{Address, CredentialRequest, RequestId, ShareId, SharedCredential, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// Inclusion proof for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// A `CredentialVerified` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialVerified {
    pub share_id: ShareId,
    pub verifier: Address,
}

/// Opaque position in the ledger's event stream.
///
/// Events at or after the cursor have not been delivered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventCursor(pub u64);

/// Typed operations of the credential contract, bound to one account.
#[async_trait]
pub trait CredentialLedger: Send + Sync {
    /// The account reads are made from and transactions are signed by.
    fn account(&self) -> Address;

    /// Number of credential requests ever created. Ids run `1..=count`.
    async fn request_count(&self) -> Result<u64, ChainError>;

    /// Number of shares ever created. Ids run `1..=count`.
    async fn shared_credential_count(&self) -> Result<u64, ChainError>;

    /// The request stored under `id`.
    async fn request(&self, id: RequestId) -> Result<CredentialRequest, ChainError>;

    /// The share stored under `id`.
    async fn shared_credential(&self, id: ShareId) -> Result<SharedCredential, ChainError>;

    /// The credential a share points at.
    async fn credential_by_id(&self, id: RequestId) -> Result<CredentialRequest, ChainError>;

    /// Ask `verifier` to approve a new credential.
    async fn request_credential(
        &self,
        credential_type: &str,
        enrollment_number: &str,
        verifier: &Address,
    ) -> Result<TxHash, ChainError>;

    /// Approve request `id`, attaching `notes`.
    async fn approve_credential(&self, id: RequestId, notes: &str) -> Result<TxHash, ChainError>;

    /// Share approved credential `id` with `recipient`.
    async fn share_credential(
        &self,
        id: RequestId,
        recipient: &Address,
        document_type: &str,
    ) -> Result<TxHash, ChainError>;

    /// Mark share `id` as verified.
    async fn verify_shared_credential(&self, id: ShareId) -> Result<TxHash, ChainError>;

    /// Resolve once `tx_hash` is included. Reverted transactions are errors.
    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError>;

    /// A cursor positioned after every event emitted so far.
    async fn event_cursor(&self) -> Result<EventCursor, ChainError>;

    /// `CredentialVerified` events emitted at or after `cursor`, plus the
    /// cursor to resume from.
    async fn verified_events_since(
        &self,
        cursor: EventCursor,
    ) -> Result<(Vec<CredentialVerified>, EventCursor), ChainError>;
}
