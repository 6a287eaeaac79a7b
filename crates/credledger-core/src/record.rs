//! # Ledger Records
//!
//! The two record kinds the ledger stores. Both are append-only and
//! addressed by dense 1-based ids; each mutates exactly once
//! (`approved` / `verified` flip from false to true).

use serde::{Deserialize, Serialize};

use crate::identity::{Address, CredentialId, RequestId, ShareId};

/// A holder's request for a verifier to certify a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub id: RequestId,
    pub credential_type: String,
    pub enrollment_number: String,
    pub requester: Address,
    pub verifier_id: Address,
    pub approved: bool,
    /// Meaningful only once `approved` is true.
    pub credential_id: CredentialId,
    pub verifier_notes: String,
}

impl CredentialRequest {
    /// A request is visible to its requester and its designated verifier.
    pub fn is_visible_to(&self, account: &Address) -> bool {
        self.requester == *account || self.verifier_id == *account
    }
}

/// A holder granting another party access to an approved credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCredential {
    pub share_id: ShareId,
    /// The [`CredentialRequest`] this share points at.
    pub original_credential_id: RequestId,
    pub shared_by: Address,
    pub shared_with: Address,
    pub verified: bool,
    /// Seconds since the Unix epoch, as recorded by the ledger.
    pub share_timestamp: u64,
}

impl SharedCredential {
    /// A share is visible to the party that shared it and the recipient.
    pub fn is_visible_to(&self, account: &Address) -> bool {
        self.shared_by == *account || self.shared_with == *account
    }
}
