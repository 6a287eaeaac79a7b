//! # credledger-core: Foundational Types
//!
//! Defines the type-system primitives shared by every other crate in the
//! workspace. The ledger owns all credential state; the types here are the
//! client's typed view of what the ledger returns.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** [`Address`], [`CredentialId`],
//!    [`RequestId`], [`ShareId`] and [`TxHash`] are distinct types with
//!    validating constructors. No bare strings or integers cross crate
//!    boundaries as identifiers.
//!
//! 2. **Byte-level address equality.** Addresses are stored as 20 raw
//!    bytes, so two renderings that differ only in hex case compare equal.
//!
//! 3. **Explicit unassigned sentinel.** A [`CredentialId`] of all zeros
//!    means "not yet assigned"; [`CredentialId::is_assigned`] is the only
//!    way to ask the question.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `credledger-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod document;
pub mod error;
pub mod identity;
pub mod record;

pub use document::DocumentType;
pub use error::ValidationError;
pub use identity::{Address, CredentialId, RequestId, ShareId, TxHash};
pub use record::{CredentialRequest, SharedCredential};
