//! # Verification Watcher
//!
//! Keeps views current with ledger-emitted `CredentialVerified` events.
//! Any new event triggers a full re-projection of every watched view; no
//! incremental patching.
//!
//! The watcher runs as a background task owned by a [`Subscription`].
//! Cancelling or dropping the subscription stops the task.

use std::sync::Arc;
use std::time::Duration;

use credledger_chain::ChainError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::ProjectionEngine;
use crate::view::ViewKind;

/// Handle on a running watcher.
///
/// The watch channel carries the refresh generation: it starts at 0 and
/// increases by one after each re-projection triggered by new events.
#[derive(Debug)]
pub struct Subscription {
    updates: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// The latest published refresh generation.
    pub fn generation(&self) -> u64 {
        *self.updates.borrow()
    }

    /// Wait for the next re-projection. `None` once the watcher has stopped.
    pub async fn changed(&mut self) -> Option<u64> {
        self.updates.changed().await.ok()?;
        Some(*self.updates.borrow_and_update())
    }

    /// Another receiver of the refresh generation.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the watcher.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("verification watcher stopped");
    }
}

/// Start watching for verification events and re-projecting `kinds`.
///
/// The event cursor is taken before this returns, so events emitted after
/// the call are never missed.
pub async fn watch_verifications(
    engine: Arc<ProjectionEngine>,
    kinds: Vec<ViewKind>,
    poll_interval: Duration,
) -> Result<Subscription, ChainError> {
    let mut cursor = engine.ledger().event_cursor().await?;
    let (tx, updates) = watch::channel(0u64);
    tracing::debug!(views = ?kinds, ?cursor, "verification watcher started");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut generation = 0u64;
        loop {
            ticker.tick().await;
            let events = match engine.ledger().verified_events_since(cursor).await {
                Ok((events, next)) => {
                    cursor = next;
                    events
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to poll verification events");
                    continue;
                }
            };
            if events.is_empty() {
                continue;
            }

            tracing::info!(
                events = events.len(),
                views = kinds.len(),
                "verification events received, re-projecting"
            );
            for result in engine.refresh_all(&kinds).await {
                if let (kind, Err(err)) = result {
                    tracing::warn!(view = ?kind, error = %err, "re-projection after verification failed");
                }
            }
            generation += 1;
            if tx.send(generation).is_err() {
                break;
            }
        }
    });

    Ok(Subscription { updates, task })
}
