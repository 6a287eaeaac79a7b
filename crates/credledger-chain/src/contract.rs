//! # Credential Contract Interface
//!
//! The fixed interface description of the deployed credential contract:
//! function selectors, the verification event topic, and the layout of the
//! two record structs.
//!
//! ```solidity
//! struct CredentialRequest {
//!     uint256 id;
//!     string  credentialType;
//!     string  enrollmentNumber;
//!     address requester;
//!     address verifierId;
//!     bool    approved;
//!     bytes32 credentialId;
//!     string  verifierNotes;
//! }
//!
//! struct SharedCredential {
//!     uint256 shareId;
//!     uint256 originalCredentialId;
//!     address sharedBy;
//!     address sharedWith;
//!     bool    verified;
//!     uint256 shareTimestamp;
//! }
//!
//! event CredentialVerified(uint256 shareId, address verifier);
//! ```
//!
//! Public mapping getters (`requests`, `sharedCredentials`) return the
//! struct members flattened into the top-level tuple. `getCredentialById`
//! returns the struct itself, which, containing strings, is a dynamic tuple
//! referenced by an offset in the first head word.

use credledger_core::{CredentialId, CredentialRequest, RequestId, ShareId, SharedCredential};

use crate::abi::{AbiError, Decoder};

/// Selectors are the first four bytes of keccak256 of the canonical signature.
pub mod selector {
    /// `requestCount()`
    pub const REQUEST_COUNT: [u8; 4] = [0x5b, 0xad, 0xbe, 0x4c];
    /// `sharedCredentialCount()`
    pub const SHARED_CREDENTIAL_COUNT: [u8; 4] = [0x39, 0x89, 0x05, 0x7b];
    /// `requests(uint256)`
    pub const REQUESTS: [u8; 4] = [0x81, 0xd1, 0x2c, 0x58];
    /// `sharedCredentials(uint256)`
    pub const SHARED_CREDENTIALS: [u8; 4] = [0xff, 0xea, 0x4a, 0x20];
    /// `getCredentialById(uint256)`
    pub const GET_CREDENTIAL_BY_ID: [u8; 4] = [0x3e, 0xf3, 0x9e, 0x2a];
    /// `requestCredential(string,string,address)`
    pub const REQUEST_CREDENTIAL: [u8; 4] = [0xf9, 0xfc, 0x3d, 0xf6];
    /// `approveCredential(uint256,string)`
    pub const APPROVE_CREDENTIAL: [u8; 4] = [0x0c, 0xe6, 0xe9, 0xa1];
    /// `shareCredential(uint256,address,string)`
    pub const SHARE_CREDENTIAL: [u8; 4] = [0x66, 0x3a, 0x7c, 0x50];
    /// `verifySharedCredential(uint256)`
    pub const VERIFY_SHARED_CREDENTIAL: [u8; 4] = [0xfe, 0xb8, 0xc4, 0x44];
}

/// keccak256(`CredentialVerified(uint256,address)`).
pub const CREDENTIAL_VERIFIED_TOPIC: &str =
    "0xc3c860bc3d914100fbce06d39b8b5198e8df7db490af5c5ea04daf26d2728be6";

/// Decode a `CredentialRequest` whose members start at word 0 of `dec`.
pub fn decode_request(dec: &Decoder<'_>) -> Result<CredentialRequest, AbiError> {
    Ok(CredentialRequest {
        id: decode_request_id(dec, 0)?,
        credential_type: dec.string(1)?,
        enrollment_number: dec.string(2)?,
        requester: dec.address(3)?,
        verifier_id: dec.address(4)?,
        approved: dec.bool(5)?,
        credential_id: CredentialId::from_bytes(dec.bytes32(6)?),
        verifier_notes: dec.string(7)?,
    })
}

/// Decode a `SharedCredential` whose members start at word 0 of `dec`.
pub fn decode_share(dec: &Decoder<'_>) -> Result<SharedCredential, AbiError> {
    let share_id = ShareId::new(dec.uint(0)?).map_err(|_| AbiError::EmptyRecord { word: 0 })?;
    Ok(SharedCredential {
        share_id,
        original_credential_id: decode_request_id(dec, 1)?,
        shared_by: dec.address(2)?,
        shared_with: dec.address(3)?,
        verified: dec.bool(4)?,
        share_timestamp: dec.uint(5)?,
    })
}

fn decode_request_id(dec: &Decoder<'_>, word: usize) -> Result<RequestId, AbiError> {
    RequestId::new(dec.uint(word)?).map_err(|_| AbiError::EmptyRecord { word })
}
