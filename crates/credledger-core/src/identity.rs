//! # Identity Newtypes
//!
//! Identifiers exchanged with the ledger. Each identifier is a distinct
//! type, so a [`ShareId`] cannot be passed where a [`RequestId`] is
//! expected even though both are integers on the wire.
//!
//! ## Validation
//!
//! Hex-encoded identifiers ([`Address`], [`CredentialId`], [`TxHash`])
//! validate length and alphabet at construction time and serialize as
//! `0x`-prefixed lowercase hex. Integer identifiers reject zero, because
//! ledger ids are 1-based.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Implements string-based `Serialize`/`Deserialize` for hex newtypes,
/// routing deserialization through `parse()` so malformed cached values are
/// rejected instead of silently accepted.
macro_rules! impl_hex_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

fn decode_fixed<const N: usize>(raw: &str) -> Option<[u8; N]> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if digits.len() != N * 2 {
        return None;
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

// ---------------------------------------------------------------------------
// Account addresses
// ---------------------------------------------------------------------------

/// A 20-byte account address.
///
/// Parsing accepts any hex case; EIP-55 checksums are not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Parse `0x` followed by 40 hex characters.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        decode_fixed::<20>(raw.trim())
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidAddress(raw.to_string()))
    }

    /// Build an address from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// `0x1234…abcd` form for narrow table columns.
    pub fn abbreviated(&self) -> String {
        let full = self.to_hex();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl_hex_serde!(Address);

// ---------------------------------------------------------------------------
// 32-byte identifiers
// ---------------------------------------------------------------------------

/// The ledger-assigned identifier of an approved credential (`bytes32`).
///
/// All zeros means the credential has not been assigned one yet, which is
/// the case for every request until its verifier approves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CredentialId([u8; 32]);

impl CredentialId {
    /// The unassigned sentinel.
    pub const UNASSIGNED: CredentialId = CredentialId([0u8; 32]);

    /// Parse `0x` followed by 64 hex characters.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        decode_fixed::<32>(raw.trim())
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidBytes32(raw.to_string()))
    }

    /// Build an identifier from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the ledger has assigned this identifier.
    pub fn is_assigned(&self) -> bool {
        self.0 != [0u8; 32]
    }

    /// Lowercase `0x`-prefixed hex rendering (66 characters).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// First 10 and last 8 characters of the hex rendering.
    pub fn short(&self) -> String {
        let full = self.to_hex();
        format!("{}...{}", &full[..10], &full[58..])
    }
}

impl_hex_serde!(CredentialId);

/// A transaction hash returned on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Parse `0x` followed by 64 hex characters.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        decode_fixed::<32>(raw.trim())
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidBytes32(raw.to_string()))
    }

    /// Build a hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Lowercase `0x`-prefixed hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl_hex_serde!(TxHash);

// ---------------------------------------------------------------------------
// Integer record identifiers
// ---------------------------------------------------------------------------

/// The 1-based index of a credential request on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Create a request id, rejecting zero.
    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::ZeroId {
                kind: "request",
                value,
            });
        }
        Ok(Self(value))
    }

    /// The underlying integer.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// The 1-based index of a shared-credential record on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ShareId(u64);

impl ShareId {
    /// Create a share id, rejecting zero.
    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::ZeroId {
                kind: "share",
                value,
            });
        }
        Ok(Self(value))
    }

    /// The underlying integer.
    pub fn get(&self) -> u64 {
        self.0
    }
}

macro_rules! impl_positive_id {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = u64::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<u64> for $ty {
            type Error = ValidationError;

            fn try_from(value: u64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

impl_positive_id!(RequestId);
impl_positive_id!(ShareId);
