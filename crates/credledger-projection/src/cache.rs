//! # Snapshot Cache
//!
//! A string-keyed, string-valued store holding the last successful
//! projection of each view, so a view can show something when the ledger
//! is unreachable. Writes are last-writer-wins per key.
//!
//! Cache failures never reach callers of the projection engine: they are
//! logged at `warn` and treated as a cache miss.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use credledger_core::Address;
use dashmap::DashMap;
use thiserror::Error;

use crate::view::{ViewKind, ViewModel};

/// Local persistence failures.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache key {0:?} is not a plain file name")]
    InvalidKey(String),

    #[error("cached snapshot {key} is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cached snapshot {key} belongs to another view")]
    Mismatch { key: String },
}

/// Keyed string storage for view snapshots.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn put(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key in a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader sees either the previous snapshot or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let plain = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !plain {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| CacheError::Io {
            key: key.to_string(),
            source,
        };
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(value.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }
}

/// Typed, failure-swallowing access to a [`SnapshotStore`].
#[derive(Clone)]
pub(crate) struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotCache {
    pub(crate) fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// The persisted snapshot of `kind` for `account`, if one is readable.
    pub(crate) fn load(&self, kind: ViewKind, account: &Address) -> Option<ViewModel> {
        let key = kind.cache_key(account);
        match self.try_load(&key, kind, account) {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!(view = ?kind, %key, error = %err, "ignoring unreadable cached snapshot");
                None
            }
        }
    }

    fn try_load(
        &self,
        key: &str,
        kind: ViewKind,
        account: &Address,
    ) -> Result<Option<ViewModel>, CacheError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        let model: ViewModel = serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        if model.kind != kind || model.account != *account {
            return Err(CacheError::Mismatch {
                key: key.to_string(),
            });
        }
        Ok(Some(model))
    }

    /// Persist `model`. Failures are logged and otherwise ignored.
    pub(crate) fn save(&self, model: &ViewModel) {
        let key = model.kind.cache_key(&model.account);
        let result = serde_json::to_string(model)
            .map_err(|source| CacheError::Corrupt {
                key: key.clone(),
                source,
            })
            .and_then(|json| self.store.put(&key, &json));
        match result {
            Ok(()) => tracing::debug!(view = ?model.kind, %key, rows = model.len(), "snapshot persisted"),
            Err(err) => tracing::warn!(view = ?model.kind, %key, error = %err, "failed to persist snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewRows;
    use credledger_core::{CredentialId, CredentialRequest, RequestId};

    fn model(account: Address) -> ViewModel {
        ViewModel {
            kind: ViewKind::MyRequests,
            account,
            rows: ViewRows::Requests(vec![CredentialRequest {
                id: RequestId::new(1).unwrap(),
                credential_type: "Degree".into(),
                enrollment_number: "EN123".into(),
                requester: account,
                verifier_id: Address::from_bytes([2; 20]),
                approved: false,
                credential_id: CredentialId::UNASSIGNED,
                verifier_notes: String::new(),
            }]),
        }
    }

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::InvalidKey(key.to_string()))
        }

        fn put(&self, key: &str, _value: &str) -> Result<(), CacheError> {
            Err(CacheError::InvalidKey(key.to_string()))
        }
    }

    #[test]
    fn memory_store_last_writer_wins() {
        let store = MemoryStore::new();
        store.put("k", "one").unwrap();
        store.clone().put("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("cache")).unwrap();
        assert_eq!(store.get("sharedCredentials-0xabc").unwrap(), None);

        store.put("sharedCredentials-0xabc", "[1,2,3]").unwrap();
        store.put("sharedCredentials-0xabc", "[4]").unwrap();
        assert_eq!(store.get("sharedCredentials-0xabc").unwrap().as_deref(), Some("[4]"));
        assert!(!store.dir().join("sharedCredentials-0xabc.json.tmp").exists());
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(store.put("../escape", "x"), Err(CacheError::InvalidKey(_))));
        assert!(matches!(store.get(""), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn cache_round_trips_view_model() {
        let account = Address::from_bytes([1; 20]);
        let cache = SnapshotCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load(ViewKind::MyRequests, &account).is_none());

        cache.save(&model(account));
        assert_eq!(cache.load(ViewKind::MyRequests, &account), Some(model(account)));
        assert!(cache.load(ViewKind::MyRequests, &Address::from_bytes([9; 20])).is_none());
    }

    #[test]
    fn corrupt_or_foreign_entries_are_misses() {
        let account = Address::from_bytes([1; 20]);
        let store = MemoryStore::new();
        store
            .put(&ViewKind::MyRequests.cache_key(&account), "not json")
            .unwrap();
        let foreign = serde_json::to_string(&model(Address::from_bytes([5; 20]))).unwrap();
        store
            .put(&ViewKind::PendingApprovals.cache_key(&account), &foreign)
            .unwrap();

        let cache = SnapshotCache::new(Arc::new(store));
        assert!(cache.load(ViewKind::MyRequests, &account).is_none());
        assert!(cache.load(ViewKind::PendingApprovals, &account).is_none());
    }

    #[test]
    fn broken_store_is_swallowed() {
        let account = Address::from_bytes([1; 20]);
        let cache = SnapshotCache::new(Arc::new(BrokenStore));
        cache.save(&model(account));
        assert!(cache.load(ViewKind::MyRequests, &account).is_none());
    }
}
