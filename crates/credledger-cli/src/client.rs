//! Wiring from configuration to a connected projection engine.
//!
//! A successful connection remembers the account in the cache directory.
//! When the wallet later cannot be reached, the views of that account are
//! still shown from their saved snapshots.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use credledger_chain::{
    ChainConnector, ConnectError, ContractGateway, CredentialLedger, LedgerConfig, OfflineLedger,
    Session,
};
use credledger_core::Address;
use credledger_projection::{
    ActionSubmitter, FileStore, ProjectionEngine, SnapshotStore, ViewKind,
};

/// Cache key holding the most recently connected account.
pub const LAST_ACCOUNT_KEY: &str = "lastAccount";

/// A connected account: its views and the actions it can take.
#[derive(Debug, Clone)]
pub struct Client {
    pub engine: Arc<ProjectionEngine>,
    pub actions: ActionSubmitter,
    pub poll_interval: Duration,
}

impl Client {
    /// Assemble a client over an already-bound ledger handle.
    pub fn new(
        ledger: Arc<dyn CredentialLedger>,
        store: Arc<dyn SnapshotStore>,
        poll_interval: Duration,
        confirmation_timeout: Option<Duration>,
    ) -> Self {
        let engine = Arc::new(ProjectionEngine::new(ledger, store));
        let actions =
            ActionSubmitter::new(Arc::clone(&engine)).with_confirmation_timeout(confirmation_timeout);
        Self {
            engine,
            actions,
            poll_interval,
        }
    }

    /// Connect the configured wallet, bind the contract and open the
    /// snapshot cache in `cache_dir`.
    pub async fn connect(config: &LedgerConfig, cache_dir: &Path) -> anyhow::Result<Self> {
        let store = open_store(cache_dir)?;
        let session = establish(config).await.map_err(connect_failure)?;
        Ok(Self::online(config, &session, store))
    }

    /// Like [`Client::connect`], but an unreachable wallet yields a client
    /// for the last connected account whose reads all fail, so views fall
    /// back to their saved snapshots.
    ///
    /// Without a remembered account the connection error is returned.
    pub async fn connect_or_offline(
        config: &LedgerConfig,
        cache_dir: &Path,
    ) -> anyhow::Result<Self> {
        let store = open_store(cache_dir)?;
        let reason = match establish(config).await {
            Ok(session) => return Ok(Self::online(config, &session, store)),
            Err(ConnectError::WalletUnavailable(reason)) => reason,
            Err(err) => return Err(connect_failure(err)),
        };
        let Some(account) = last_account(&store) else {
            return Err(connect_failure(ConnectError::WalletUnavailable(reason)));
        };
        tracing::warn!(%account, %reason, "wallet unreachable, showing saved views");
        let client = Self::new(
            Arc::new(OfflineLedger::new(account, reason)),
            Arc::new(store),
            config.poll_interval,
            config.confirmation_timeout,
        );
        for kind in ViewKind::ALL {
            client.engine.warm_from_cache(kind);
        }
        Ok(client)
    }

    fn online(config: &LedgerConfig, session: &Session, store: FileStore) -> Self {
        remember_account(&store, &session.address());
        let gateway = ContractGateway::bind(session, config.contract_address)
            .with_poll_interval(config.poll_interval);
        Self::new(
            Arc::new(gateway),
            Arc::new(store),
            config.poll_interval,
            config.confirmation_timeout,
        )
    }
}

async fn establish(config: &LedgerConfig) -> Result<Session, ConnectError> {
    let session = ChainConnector::from_config(config)?.connect().await?;
    tracing::info!(
        address = %session.address(),
        chain_id = session.chain_id(),
        contract = %config.contract_address,
        "connected"
    );
    Ok(session)
}

fn open_store(cache_dir: &Path) -> anyhow::Result<FileStore> {
    FileStore::open(cache_dir)
        .with_context(|| format!("opening cache directory {}", cache_dir.display()))
}

/// Best effort: a cache that cannot be written only costs the offline view.
fn remember_account(store: &dyn SnapshotStore, account: &Address) {
    let result = serde_json::to_string(account)
        .map_err(|e| e.to_string())
        .and_then(|json| store.put(LAST_ACCOUNT_KEY, &json).map_err(|e| e.to_string()));
    if let Err(error) = result {
        tracing::warn!(%account, %error, "failed to remember connected account");
    }
}

/// The account saved by the last successful connection, if readable.
pub fn last_account(store: &dyn SnapshotStore) -> Option<Address> {
    let raw = match store.get(LAST_ACCOUNT_KEY) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(%error, "cannot read remembered account");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(account) => Some(account),
        Err(error) => {
            tracing::warn!(%error, "ignoring unreadable remembered account");
            None
        }
    }
}

fn connect_failure(err: ConnectError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}
