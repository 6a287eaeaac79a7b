//! In-process credential ledger.
//!
//! Enforces the same rules as the deployed contract, with the same revert
//! reasons, so projection and action code can be exercised without a node.
//! Every accepted transaction mines its own block; timestamps advance by
//! twelve seconds per block from a fixed genesis.
//!
//! One [`MemoryLedger`] holds the state; [`MemoryLedger::connect_as`] hands
//! out per-account handles that implement [`CredentialLedger`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use credledger_core::{
    Address, CredentialId, CredentialRequest, RequestId, ShareId, SharedCredential, TxHash,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::ChainError;
use crate::ledger::{CredentialLedger, CredentialVerified, EventCursor, TxReceipt};

/// Timestamp of block 0.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

const BLOCK_TIME_SECS: u64 = 12;

#[derive(Debug, Default)]
struct LedgerState {
    requests: Vec<CredentialRequest>,
    shares: Vec<SharedCredential>,
    /// Document type submitted with each share, indexed like `shares`.
    document_types: Vec<String>,
    events: Vec<CredentialVerified>,
    receipts: HashMap<TxHash, TxReceipt>,
    block: u64,
    unavailable: bool,
}

/// Vector index of a 1-based ledger id.
fn slot(id: u64) -> Option<usize> {
    usize::try_from(id.checked_sub(1)?).ok()
}

impl LedgerState {
    fn request(&self, id: RequestId) -> Option<&CredentialRequest> {
        slot(id.get()).and_then(|idx| self.requests.get(idx))
    }

    fn request_mut(&mut self, id: RequestId) -> Result<&mut CredentialRequest, String> {
        slot(id.get())
            .and_then(|idx| self.requests.get_mut(idx))
            .ok_or_else(|| "Request does not exist".to_string())
    }

    fn share(&self, id: ShareId) -> Option<&SharedCredential> {
        slot(id.get()).and_then(|idx| self.shares.get(idx))
    }

    fn share_mut(&mut self, id: ShareId) -> Result<&mut SharedCredential, String> {
        slot(id.get())
            .and_then(|idx| self.shares.get_mut(idx))
            .ok_or_else(|| "Shared credential does not exist".to_string())
    }
}

/// Shared in-memory ledger state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that reads and signs as `account`.
    pub fn connect_as(&self, account: Address) -> MemoryLedgerHandle {
        MemoryLedgerHandle {
            ledger: self.clone(),
            account,
        }
    }

    /// Make every call fail as if the node were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Number of mined blocks.
    pub fn block_number(&self) -> u64 {
        self.state.lock().block
    }

    /// The document type string submitted with share `id`.
    pub fn document_type(&self, id: ShareId) -> Option<String> {
        let state = self.state.lock();
        slot(id.get()).and_then(|idx| state.document_types.get(idx).cloned())
    }

    fn read<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&LedgerState) -> Result<T, String>,
    ) -> Result<T, ChainError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(ChainError::Unavailable(format!("{operation}: ledger offline")));
        }
        f(&state).map_err(|reason| ChainError::Rejected {
            operation: operation.to_string(),
            reason: Some(reason),
        })
    }

    /// Apply `f` in a new block. A rejected transaction leaves state untouched.
    fn transact(
        &self,
        operation: &str,
        f: impl FnOnce(&mut LedgerState, u64) -> Result<(), String>,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(ChainError::Unavailable(format!("{operation}: ledger offline")));
        }
        let block = state.block + 1;
        f(&mut state, block).map_err(|reason| {
            tracing::debug!(operation, %reason, "memory ledger rejected transaction");
            ChainError::Rejected {
                operation: operation.to_string(),
                reason: Some(reason),
            }
        })?;
        state.block = block;

        let mut hasher = Sha256::new();
        hasher.update(b"credledger-memory-tx");
        hasher.update(block.to_be_bytes());
        let tx_hash = TxHash::from_bytes(hasher.finalize().into());
        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number: block,
            },
        );
        Ok(tx_hash)
    }
}

fn derive_credential_id(id: RequestId, requester: &Address, verifier: &Address) -> CredentialId {
    let mut hasher = Sha256::new();
    hasher.update(id.get().to_be_bytes());
    hasher.update(requester.as_bytes());
    hasher.update(verifier.as_bytes());
    CredentialId::from_bytes(hasher.finalize().into())
}

fn next_id(len: usize) -> u64 {
    len as u64 + 1
}

/// [`MemoryLedger`] bound to one account.
#[derive(Debug, Clone)]
pub struct MemoryLedgerHandle {
    ledger: MemoryLedger,
    account: Address,
}

impl MemoryLedgerHandle {
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }
}

#[async_trait]
impl CredentialLedger for MemoryLedgerHandle {
    fn account(&self) -> Address {
        self.account
    }

    async fn request_count(&self) -> Result<u64, ChainError> {
        self.ledger
            .read("requestCount", |s| Ok(s.requests.len() as u64))
    }

    async fn shared_credential_count(&self) -> Result<u64, ChainError> {
        self.ledger
            .read("sharedCredentialCount", |s| Ok(s.shares.len() as u64))
    }

    async fn request(&self, id: RequestId) -> Result<CredentialRequest, ChainError> {
        self.ledger.read("requests", |s| {
            s.request(id)
                .cloned()
                .ok_or_else(|| "Request does not exist".to_string())
        })
    }

    async fn shared_credential(&self, id: ShareId) -> Result<SharedCredential, ChainError> {
        self.ledger.read("sharedCredentials", |s| {
            s.share(id)
                .cloned()
                .ok_or_else(|| "Shared credential does not exist".to_string())
        })
    }

    async fn credential_by_id(&self, id: RequestId) -> Result<CredentialRequest, ChainError> {
        self.ledger.read("getCredentialById", |s| {
            s.request(id)
                .cloned()
                .ok_or_else(|| "Credential does not exist".to_string())
        })
    }

    async fn request_credential(
        &self,
        credential_type: &str,
        enrollment_number: &str,
        verifier: &Address,
    ) -> Result<TxHash, ChainError> {
        let requester = self.account;
        self.ledger.transact("requestCredential", |s, _| {
            if *verifier == Address::ZERO {
                return Err("Invalid verifier address".into());
            }
            let id = RequestId::new(next_id(s.requests.len())).map_err(|e| e.to_string())?;
            s.requests.push(CredentialRequest {
                id,
                credential_type: credential_type.to_string(),
                enrollment_number: enrollment_number.to_string(),
                requester,
                verifier_id: *verifier,
                approved: false,
                credential_id: CredentialId::UNASSIGNED,
                verifier_notes: String::new(),
            });
            Ok(())
        })
    }

    async fn approve_credential(&self, id: RequestId, notes: &str) -> Result<TxHash, ChainError> {
        let caller = self.account;
        self.ledger.transact("approveCredential", |s, _| {
            let request = s.request_mut(id)?;
            if request.verifier_id != caller {
                return Err("Only the designated verifier can approve".into());
            }
            if request.approved {
                return Err("Credential already approved".into());
            }
            request.approved = true;
            request.credential_id =
                derive_credential_id(id, &request.requester, &request.verifier_id);
            request.verifier_notes = notes.to_string();
            Ok(())
        })
    }

    async fn share_credential(
        &self,
        id: RequestId,
        recipient: &Address,
        document_type: &str,
    ) -> Result<TxHash, ChainError> {
        let caller = self.account;
        self.ledger.transact("shareCredential", |s, block| {
            if *recipient == Address::ZERO {
                return Err("Invalid recipient address".into());
            }
            let request = s.request_mut(id)?;
            if request.requester != caller {
                return Err("Only the credential owner can share".into());
            }
            if !request.approved {
                return Err("Credential not approved".into());
            }
            let share_id = ShareId::new(next_id(s.shares.len())).map_err(|e| e.to_string())?;
            s.shares.push(SharedCredential {
                share_id,
                original_credential_id: id,
                shared_by: caller,
                shared_with: *recipient,
                verified: false,
                share_timestamp: GENESIS_TIMESTAMP + block * BLOCK_TIME_SECS,
            });
            s.document_types.push(document_type.to_string());
            Ok(())
        })
    }

    async fn verify_shared_credential(&self, id: ShareId) -> Result<TxHash, ChainError> {
        let caller = self.account;
        self.ledger.transact("verifySharedCredential", |s, _| {
            let share = s.share_mut(id)?;
            if share.shared_with != caller {
                return Err("Only the recipient can verify".into());
            }
            if share.verified {
                return Err("Credential already verified".into());
            }
            share.verified = true;
            s.events.push(CredentialVerified {
                share_id: id,
                verifier: caller,
            });
            Ok(())
        })
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        self.ledger.read("eth_getTransactionReceipt", |s| {
            s.receipts
                .get(tx_hash)
                .copied()
                .ok_or_else(|| format!("unknown transaction {tx_hash}"))
        })
    }

    async fn event_cursor(&self) -> Result<EventCursor, ChainError> {
        self.ledger
            .read("eth_blockNumber", |s| Ok(EventCursor(s.events.len() as u64)))
    }

    async fn verified_events_since(
        &self,
        cursor: EventCursor,
    ) -> Result<(Vec<CredentialVerified>, EventCursor), ChainError> {
        self.ledger.read("eth_getLogs", |s| {
            let start = usize::try_from(cursor.0).unwrap_or(usize::MAX);
            let events = s.events.get(start..).map(<[_]>::to_vec).unwrap_or_default();
            Ok((events, EventCursor(s.events.len() as u64)))
        })
    }
}
