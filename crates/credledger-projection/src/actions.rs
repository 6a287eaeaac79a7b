//! # Action Submitters
//!
//! The four state-changing operations. Each follows the same protocol:
//!
//! 1. Validate local preconditions. Nothing is sent if this fails.
//! 2. Submit the transaction from the engine's account.
//! 3. Wait for the ledger to include it.
//! 4. Re-project the affected view.
//!
//! A failure in steps 2–3 is returned as-is and no re-projection happens,
//! so the views keep their last successful state. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use credledger_chain::{ChainError, TxReceipt};
use credledger_core::error::require_non_empty;
use credledger_core::{Address, DocumentType, RequestId, ShareId, TxHash, ValidationError};
use thiserror::Error;

use crate::engine::{ProjectionEngine, ProjectionError};
use crate::view::{ViewKind, ViewModel};

/// Why an action did not complete.
#[derive(Error, Debug)]
pub enum ActionError {
    /// A local precondition failed; nothing was submitted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The ledger rejected the transaction, or it reverted.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The transaction was submitted but not confirmed in time. It may
    /// still be included later.
    #[error("transaction {tx_hash} not confirmed within {limit:?}")]
    Timeout { tx_hash: TxHash, limit: Duration },
}

impl ActionError {
    /// Text suitable for showing to the person who triggered the action.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => format!("Please fix the form: {err}."),
            Self::Chain(ChainError::Disconnected) => {
                "Your wallet session has ended. Reconnect and try again.".to_string()
            }
            Self::Chain(ChainError::Unavailable(_)) => {
                "The ledger could not be reached. Check your connection and try again.".to_string()
            }
            Self::Chain(err) => match err.reason() {
                Some(reason) => format!("The ledger rejected the transaction: {reason}"),
                None => format!("The ledger rejected the transaction ({err})."),
            },
            Self::Timeout { tx_hash, .. } => format!(
                "Transaction {} is still pending. Check again later before retrying.",
                tx_hash.to_hex()
            ),
        }
    }
}

/// A confirmed action.
#[derive(Debug)]
pub struct ActionOutcome {
    pub receipt: TxReceipt,
    /// The re-projection of the affected view. Its failure does not undo
    /// the confirmed transaction.
    pub refreshed: Result<Arc<ViewModel>, ProjectionError>,
}

/// Submits actions as the engine's account and keeps its views current.
#[derive(Debug, Clone)]
pub struct ActionSubmitter {
    engine: Arc<ProjectionEngine>,
    confirmation_timeout: Option<Duration>,
}

impl ActionSubmitter {
    pub fn new(engine: Arc<ProjectionEngine>) -> Self {
        Self {
            engine,
            confirmation_timeout: None,
        }
    }

    /// Bound the wait for inclusion.
    pub fn with_confirmation_timeout(mut self, limit: Option<Duration>) -> Self {
        self.confirmation_timeout = limit;
        self
    }

    pub fn engine(&self) -> &Arc<ProjectionEngine> {
        &self.engine
    }

    /// Ask `verifier` to certify a credential. Refreshes
    /// [`ViewKind::MyRequests`].
    pub async fn request_credential(
        &self,
        credential_type: &str,
        enrollment_number: &str,
        verifier: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let credential_type = require_non_empty("credential type", credential_type)?;
        let enrollment_number = require_non_empty("enrollment number", enrollment_number)?;
        let verifier = Address::parse(require_non_empty("verifier address", verifier)?)?;

        let tx_hash = self
            .engine
            .ledger()
            .request_credential(credential_type, enrollment_number, &verifier)
            .await?;
        self.confirm_and_reproject("requestCredential", tx_hash, ViewKind::MyRequests)
            .await
    }

    /// Approve request `id`. The request must be shown unapproved in the
    /// current [`ViewKind::PendingApprovals`] snapshot. Refreshes that view.
    pub async fn approve_credential(&self, id: u64, notes: &str) -> Result<ActionOutcome, ActionError> {
        let id = RequestId::new(id)?;
        let awaiting = self
            .engine
            .snapshot(ViewKind::PendingApprovals)
            .and_then(|snapshot| snapshot.model.request(id).map(|r| !r.approved))
            .unwrap_or(false);
        if !awaiting {
            return Err(ValidationError::NotAwaitingApproval { id: id.get() }.into());
        }

        let tx_hash = self
            .engine
            .ledger()
            .approve_credential(id, notes.trim())
            .await?;
        self.confirm_and_reproject("approveCredential", tx_hash, ViewKind::PendingApprovals)
            .await
    }

    /// Share approved credential `credential_id` with `recipient`.
    /// Refreshes [`ViewKind::SharedByMe`].
    pub async fn share_credential(
        &self,
        credential_id: u64,
        recipient: &str,
        document_type: &DocumentType,
    ) -> Result<ActionOutcome, ActionError> {
        let id = RequestId::new(credential_id)?;
        let recipient = Address::parse(require_non_empty("recipient address", recipient)?)?;
        let document_type = document_type.ledger_value()?;

        let tx_hash = self
            .engine
            .ledger()
            .share_credential(id, &recipient, &document_type)
            .await?;
        self.confirm_and_reproject("shareCredential", tx_hash, ViewKind::SharedByMe)
            .await
    }

    /// Mark share `share_id` as verified. Refreshes [`ViewKind::SharedWithMe`].
    pub async fn verify_shared_credential(&self, share_id: u64) -> Result<ActionOutcome, ActionError> {
        let id = ShareId::new(share_id)?;
        let tx_hash = self.engine.ledger().verify_shared_credential(id).await?;
        self.confirm_and_reproject("verifySharedCredential", tx_hash, ViewKind::SharedWithMe)
            .await
    }

    async fn confirm_and_reproject(
        &self,
        operation: &'static str,
        tx_hash: TxHash,
        kind: ViewKind,
    ) -> Result<ActionOutcome, ActionError> {
        let wait = self.engine.ledger().wait_for_confirmation(&tx_hash);
        let receipt = match self.confirmation_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ActionError::Timeout { tx_hash, limit })??,
            None => wait.await?,
        };
        tracing::info!(
            operation,
            tx = %tx_hash,
            block = receipt.block_number,
            "action confirmed"
        );

        let refreshed = self.engine.refresh(kind).await;
        if let Err(err) = &refreshed {
            tracing::warn!(operation, view = ?kind, error = %err, "re-projection after action failed");
        }
        Ok(ActionOutcome { receipt, refreshed })
    }
}
