//! # Offline Ledger
//!
//! A [`CredentialLedger`] for an account whose wallet cannot be reached.
//! It knows only the account address; every read and every transaction
//! fails with [`ChainError::Unavailable`], so the projection engine falls
//! back to saved snapshots.

use async_trait::async_trait;
use credledger_core::{Address, CredentialRequest, RequestId, ShareId, SharedCredential, TxHash};

use crate::error::ChainError;
use crate::ledger::{CredentialLedger, CredentialVerified, EventCursor, TxReceipt};

/// Stand-in ledger bound to a remembered account.
#[derive(Debug, Clone)]
pub struct OfflineLedger {
    account: Address,
    reason: String,
}

impl OfflineLedger {
    /// `reason` is why the wallet could not be reached; it is repeated in
    /// every error.
    pub fn new(account: Address, reason: impl Into<String>) -> Self {
        Self {
            account,
            reason: reason.into(),
        }
    }

    fn unavailable<T>(&self, operation: &str) -> Result<T, ChainError> {
        Err(ChainError::Unavailable(format!(
            "{operation}: offline ({})",
            self.reason
        )))
    }
}

#[async_trait]
impl CredentialLedger for OfflineLedger {
    fn account(&self) -> Address {
        self.account
    }

    async fn request_count(&self) -> Result<u64, ChainError> {
        self.unavailable("requestCount")
    }

    async fn shared_credential_count(&self) -> Result<u64, ChainError> {
        self.unavailable("sharedCredentialCount")
    }

    async fn request(&self, _id: RequestId) -> Result<CredentialRequest, ChainError> {
        self.unavailable("requests")
    }

    async fn shared_credential(&self, _id: ShareId) -> Result<SharedCredential, ChainError> {
        self.unavailable("sharedCredentials")
    }

    async fn credential_by_id(&self, _id: RequestId) -> Result<CredentialRequest, ChainError> {
        self.unavailable("getCredentialById")
    }

    async fn request_credential(
        &self,
        _credential_type: &str,
        _enrollment_number: &str,
        _verifier: &Address,
    ) -> Result<TxHash, ChainError> {
        self.unavailable("requestCredential")
    }

    async fn approve_credential(&self, _id: RequestId, _notes: &str) -> Result<TxHash, ChainError> {
        self.unavailable("approveCredential")
    }

    async fn share_credential(
        &self,
        _id: RequestId,
        _recipient: &Address,
        _document_type: &str,
    ) -> Result<TxHash, ChainError> {
        self.unavailable("shareCredential")
    }

    async fn verify_shared_credential(&self, _id: ShareId) -> Result<TxHash, ChainError> {
        self.unavailable("verifySharedCredential")
    }

    async fn wait_for_confirmation(&self, _tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        self.unavailable("eth_getTransactionReceipt")
    }

    async fn event_cursor(&self) -> Result<EventCursor, ChainError> {
        self.unavailable("eth_blockNumber")
    }

    async fn verified_events_since(
        &self,
        _cursor: EventCursor,
    ) -> Result<(Vec<CredentialVerified>, EventCursor), ChainError> {
        self.unavailable("eth_getLogs")
    }
}
