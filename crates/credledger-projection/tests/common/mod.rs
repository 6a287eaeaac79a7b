//! Shared fixtures for projection integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use credledger_chain::{
    ChainError, CredentialLedger, CredentialVerified, EventCursor, MemoryLedger,
    MemoryLedgerHandle, TxReceipt,
};
use credledger_core::{Address, CredentialRequest, RequestId, ShareId, SharedCredential, TxHash};
use credledger_projection::{ActionSubmitter, MemoryStore, ProjectionEngine};

pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

/// One account's engine and action submitter over a shared ledger.
pub struct Party {
    pub address: Address,
    pub engine: Arc<ProjectionEngine>,
    pub actions: ActionSubmitter,
}

pub fn party(ledger: &MemoryLedger, store: &MemoryStore, byte: u8) -> Party {
    party_over(Arc::new(ledger.connect_as(addr(byte))), store)
}

pub fn party_over(handle: Arc<dyn CredentialLedger>, store: &MemoryStore) -> Party {
    let address = handle.account();
    let engine = Arc::new(ProjectionEngine::new(handle, Arc::new(store.clone())));
    Party {
        address,
        actions: ActionSubmitter::new(Arc::clone(&engine)),
        engine,
    }
}

/// Ledger wrapper that slows reads down and records how many overlap.
pub struct InstrumentedLedger {
    inner: MemoryLedgerHandle,
    read_delay: Duration,
    active_reads: AtomicUsize,
    pub max_concurrent_reads: AtomicUsize,
    pub total_reads: AtomicUsize,
    stall_confirmations: AtomicBool,
}

impl InstrumentedLedger {
    pub fn new(inner: MemoryLedgerHandle, read_delay: Duration) -> Self {
        Self {
            inner,
            read_delay,
            active_reads: AtomicUsize::new(0),
            max_concurrent_reads: AtomicUsize::new(0),
            total_reads: AtomicUsize::new(0),
            stall_confirmations: AtomicBool::new(false),
        }
    }

    /// Make `wait_for_confirmation` never resolve.
    pub fn stall_confirmations(&self) {
        self.stall_confirmations.store(true, Ordering::SeqCst);
    }

    async fn observe<T>(&self, read: impl std::future::Future<Output = T>) -> T {
        let now = self.active_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_reads.fetch_max(now, Ordering::SeqCst);
        self.total_reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.read_delay).await;
        let out = read.await;
        self.active_reads.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl CredentialLedger for InstrumentedLedger {
    fn account(&self) -> Address {
        self.inner.account()
    }

    async fn request_count(&self) -> Result<u64, ChainError> {
        self.observe(self.inner.request_count()).await
    }

    async fn shared_credential_count(&self) -> Result<u64, ChainError> {
        self.observe(self.inner.shared_credential_count()).await
    }

    async fn request(&self, id: RequestId) -> Result<CredentialRequest, ChainError> {
        self.observe(self.inner.request(id)).await
    }

    async fn shared_credential(&self, id: ShareId) -> Result<SharedCredential, ChainError> {
        self.observe(self.inner.shared_credential(id)).await
    }

    async fn credential_by_id(&self, id: RequestId) -> Result<CredentialRequest, ChainError> {
        self.observe(self.inner.credential_by_id(id)).await
    }

    async fn request_credential(
        &self,
        credential_type: &str,
        enrollment_number: &str,
        verifier: &Address,
    ) -> Result<TxHash, ChainError> {
        self.inner
            .request_credential(credential_type, enrollment_number, verifier)
            .await
    }

    async fn approve_credential(&self, id: RequestId, notes: &str) -> Result<TxHash, ChainError> {
        self.inner.approve_credential(id, notes).await
    }

    async fn share_credential(
        &self,
        id: RequestId,
        recipient: &Address,
        document_type: &str,
    ) -> Result<TxHash, ChainError> {
        self.inner.share_credential(id, recipient, document_type).await
    }

    async fn verify_shared_credential(&self, id: ShareId) -> Result<TxHash, ChainError> {
        self.inner.verify_shared_credential(id).await
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        if self.stall_confirmations.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.wait_for_confirmation(tx_hash).await
    }

    async fn event_cursor(&self) -> Result<EventCursor, ChainError> {
        self.inner.event_cursor().await
    }

    async fn verified_events_since(
        &self,
        cursor: EventCursor,
    ) -> Result<(Vec<CredentialVerified>, EventCursor), ChainError> {
        self.inner.verified_events_since(cursor).await
    }
}
