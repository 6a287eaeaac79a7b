//! # credledger-projection: Ledger Projections and Actions
//!
//! Turns the credential ledger into role-filtered views for one account and
//! keeps them current:
//!
//! - [`engine`]: full-scan projection with atomic snapshot replacement,
//!   single-flight refresh per view, and cache fallback.
//! - [`cache`]: the snapshot store backing the fallback path.
//! - [`watch`]: re-projection on `CredentialVerified` events.
//! - [`actions`]: request / approve / share / verify with
//!   confirm-then-reproject.
//!
//! ## Error Policy
//!
//! Ledger failures during a projection surface as [`ProjectionError`]
//! together with the fallback view. Cache failures are logged and never
//! returned. Action failures leave every view at its last successful
//! projection.

pub mod actions;
pub mod cache;
pub mod engine;
pub mod view;
pub mod watch;

pub use actions::{ActionError, ActionOutcome, ActionSubmitter};
pub use cache::{CacheError, FileStore, MemoryStore, SnapshotStore};
pub use engine::{ProjectionEngine, ProjectionError, Snapshot, SnapshotOrigin};
pub use view::{RecordSource, ShareRow, ViewKind, ViewModel, ViewRows};
pub use watch::{watch_verifications, Subscription};
