//! # Error Types
//!
//! Local validation failures. These are raised before any ledger I/O and
//! never leave a partially submitted action behind.

use thiserror::Error;

/// A local precondition failed before anything was sent to the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty (or whitespace only).
    #[error("{field} is required")]
    EmptyField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// An account address was not `0x` followed by 40 hex characters.
    #[error("invalid address {0:?}: expected 0x followed by 40 hex characters")]
    InvalidAddress(String),

    /// A 32-byte identifier was not `0x` followed by 64 hex characters.
    #[error("invalid 32-byte identifier {0:?}")]
    InvalidBytes32(String),

    /// Record ids are 1-based.
    #[error("{kind} id must be a positive integer, got {value}")]
    ZeroId {
        /// Which id space was addressed (`request` or `share`).
        kind: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// The "Other" document type was chosen without a custom value.
    #[error("a custom document type is required when \"Other\" is selected")]
    CustomDocumentTypeRequired,

    /// The record is not in a state the current view allows acting on.
    #[error("request #{id} is not awaiting your approval")]
    NotAwaitingApproval {
        /// The request id that was addressed.
        id: u64,
    },
}

/// Trim `value` and reject it when nothing remains.
pub fn require_non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(trimmed)
    }
}
