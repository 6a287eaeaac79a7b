//! # Projection Engine
//!
//! Projects the append-only, index-addressed ledger into role-filtered
//! views for one account.
//!
//! ## Refresh protocol
//!
//! 1. Read the authoritative counter for the view's collection (`n`).
//! 2. Fetch ids `1..=n` in order; keep rows matching the view's predicate.
//! 3. For share views, dereference each kept share's original credential.
//! 4. Swap the new snapshot in atomically.
//! 5. Persist it to the snapshot cache, best effort.
//!
//! Any ledger failure in steps 1–3 leaves the scan unfinished. The engine
//! then falls back to the persisted snapshot for the view, or to an empty
//! view, installs that, and returns a [`ProjectionError`] carrying both the
//! failure and the fallback.
//!
//! ## Concurrency
//!
//! At most one refresh per view is in flight. Callers that arrive while a
//! refresh is running wait on the view's async mutex and then run their
//! own fresh scan, so each caller observes ledger state no older than its
//! call.

use std::collections::HashMap;
use std::sync::Arc;

use credledger_chain::{ChainError, CredentialLedger};
use credledger_core::{Address, RequestId, ShareId};
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::cache::{SnapshotCache, SnapshotStore};
use crate::view::{RecordSource, ShareRow, ViewKind, ViewModel, ViewRows};

/// Where the current snapshot of a view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// A completed scan of the ledger.
    Ledger,
    /// The persisted snapshot, because the ledger could not be read.
    Cache,
    /// Nothing could be read and nothing was cached.
    Empty,
}

/// The engine's current view of one [`ViewKind`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub model: Arc<ViewModel>,
    pub origin: SnapshotOrigin,
}

impl Snapshot {
    /// Whether the rows may be stale because the ledger was unreachable.
    pub fn is_fallback(&self) -> bool {
        self.origin != SnapshotOrigin::Ledger
    }
}

/// A refresh failed; the view now shows the fallback.
#[derive(Error, Debug)]
#[error("projection of {kind} failed: {source}")]
pub struct ProjectionError {
    pub kind: ViewKind,
    #[source]
    pub source: ChainError,
    /// What the view shows instead: the cached snapshot, or an empty view.
    pub fallback: Arc<ViewModel>,
    /// Whether `fallback` came from the cache.
    pub from_cache: bool,
}

/// Role-filtered projections of the ledger for the ledger handle's account.
pub struct ProjectionEngine {
    ledger: Arc<dyn CredentialLedger>,
    cache: SnapshotCache,
    snapshots: RwLock<HashMap<ViewKind, Snapshot>>,
    in_flight: DashMap<ViewKind, Arc<tokio::sync::Mutex<()>>>,
}

impl std::fmt::Debug for ProjectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionEngine")
            .field("account", &self.account())
            .field("views", &self.snapshots.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ProjectionEngine {
    pub fn new(ledger: Arc<dyn CredentialLedger>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            ledger,
            cache: SnapshotCache::new(store),
            snapshots: RwLock::new(HashMap::new()),
            in_flight: DashMap::new(),
        }
    }

    /// The account whose views this engine projects.
    pub fn account(&self) -> Address {
        self.ledger.account()
    }

    pub fn ledger(&self) -> &Arc<dyn CredentialLedger> {
        &self.ledger
    }

    /// The current snapshot of `kind`, if one has been loaded.
    pub fn snapshot(&self, kind: ViewKind) -> Option<Snapshot> {
        self.snapshots.read().get(&kind).cloned()
    }

    /// Seed `kind` from the persisted snapshot when nothing is loaded yet.
    ///
    /// Returns the model now shown, if any.
    pub fn warm_from_cache(&self, kind: ViewKind) -> Option<Arc<ViewModel>> {
        if let Some(current) = self.snapshot(kind) {
            return Some(current.model);
        }
        let model = Arc::new(self.cache.load(kind, &self.account())?);
        let mut snapshots = self.snapshots.write();
        let entry = snapshots.entry(kind).or_insert_with(|| Snapshot {
            model,
            origin: SnapshotOrigin::Cache,
        });
        tracing::debug!(view = ?kind, rows = entry.model.len(), "view warmed from cache");
        Some(Arc::clone(&entry.model))
    }

    /// Re-project `kind` from the ledger.
    pub async fn refresh(&self, kind: ViewKind) -> Result<Arc<ViewModel>, ProjectionError> {
        let lock = Arc::clone(&self.in_flight.entry(kind).or_default());
        let _guard = lock.lock().await;

        match self.scan(kind).await {
            Ok(model) => {
                let model = Arc::new(model);
                self.install(kind, Arc::clone(&model), SnapshotOrigin::Ledger);
                self.cache.save(&model);
                tracing::info!(view = ?kind, rows = model.len(), "view refreshed");
                Ok(model)
            }
            Err(source) => {
                let account = self.account();
                let (fallback, origin) = match self.cache.load(kind, &account) {
                    Some(cached) => (cached, SnapshotOrigin::Cache),
                    None => (ViewModel::empty(kind, account), SnapshotOrigin::Empty),
                };
                let fallback = Arc::new(fallback);
                self.install(kind, Arc::clone(&fallback), origin);
                tracing::warn!(
                    view = ?kind,
                    error = %source,
                    rows = fallback.len(),
                    from_cache = origin == SnapshotOrigin::Cache,
                    "projection failed, showing fallback"
                );
                Err(ProjectionError {
                    kind,
                    source,
                    fallback,
                    from_cache: origin == SnapshotOrigin::Cache,
                })
            }
        }
    }

    /// Refresh each of `kinds` in turn, collecting per-view results.
    pub async fn refresh_all(
        &self,
        kinds: &[ViewKind],
    ) -> Vec<(ViewKind, Result<Arc<ViewModel>, ProjectionError>)> {
        let mut results = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            results.push((kind, self.refresh(kind).await));
        }
        results
    }

    fn install(&self, kind: ViewKind, model: Arc<ViewModel>, origin: SnapshotOrigin) {
        self.snapshots
            .write()
            .insert(kind, Snapshot { model, origin });
    }

    /// One full pass over the ledger for `kind`. No side effects.
    async fn scan(&self, kind: ViewKind) -> Result<ViewModel, ChainError> {
        let account = self.account();
        let rows = match kind.source() {
            RecordSource::Requests => {
                let count = self.ledger.request_count().await?;
                let mut rows = Vec::new();
                for i in 1..=count {
                    let request = self.ledger.request(record_id(i, RequestId::new)?).await?;
                    if kind.keeps_request(&request, &account) {
                        debug_assert!(request.is_visible_to(&account));
                        rows.push(request);
                    }
                }
                tracing::debug!(view = ?kind, scanned = count, kept = rows.len(), "request scan complete");
                ViewRows::Requests(rows)
            }
            RecordSource::Shares => {
                let count = self.ledger.shared_credential_count().await?;
                let mut rows = Vec::new();
                for i in 1..=count {
                    let share = self
                        .ledger
                        .shared_credential(record_id(i, ShareId::new)?)
                        .await?;
                    if kind.keeps_share(&share, &account) {
                        debug_assert!(share.is_visible_to(&account));
                        let original = self
                            .ledger
                            .credential_by_id(share.original_credential_id)
                            .await?;
                        rows.push(ShareRow::new(share, &original));
                    }
                }
                tracing::debug!(view = ?kind, scanned = count, kept = rows.len(), "share scan complete");
                ViewRows::Shares(rows)
            }
        };
        Ok(ViewModel {
            kind,
            account,
            rows,
        })
    }
}

fn record_id<T, E: std::fmt::Display>(
    index: u64,
    make: impl FnOnce(u64) -> Result<T, E>,
) -> Result<T, ChainError> {
    make(index).map_err(|e| ChainError::Decode {
        operation: "scan".into(),
        detail: e.to_string(),
    })
}
