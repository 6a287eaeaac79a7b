//! # ABI Codec
//!
//! Minimal Solidity ABI encoding for the argument types the credential
//! contract uses (`uint256`, `address`, `bool`, `bytes32`, `string`) and a
//! word-addressed decoder for its return values.
//!
//! Encoding follows the head/tail layout: static values occupy one 32-byte
//! head word each; a `string` puts a byte offset in its head word and its
//! length-prefixed, zero-padded bytes in the tail.

use credledger_core::Address;
use thiserror::Error;

/// Width of one ABI word.
pub const WORD: usize = 32;

/// 4-byte selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Errors decoding ABI data or hex payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// A read ran past the end of the returned data.
    #[error("ABI data too short: need {needed} bytes, have {len}")]
    OutOfBounds {
        /// Bytes required to satisfy the read.
        needed: usize,
        /// Bytes available.
        len: usize,
    },

    /// An integer did not fit in 64 bits.
    #[error("uint256 at word {word} does not fit in u64")]
    Overflow {
        /// Word index of the value.
        word: usize,
    },

    /// An address word had non-zero padding.
    #[error("word {word} is not a valid address")]
    InvalidAddress {
        /// Word index of the value.
        word: usize,
    },

    /// A bool word was neither 0 nor 1.
    #[error("word {word} is not a valid bool")]
    InvalidBool {
        /// Word index of the value.
        word: usize,
    },

    /// String bytes were not UTF-8.
    #[error("string at word {word} is not valid UTF-8")]
    InvalidUtf8 {
        /// Word index of the string's offset.
        word: usize,
    },

    /// A record id word was zero, i.e. the getter returned an empty slot.
    #[error("word {word} holds a zero record id")]
    EmptyRecord {
        /// Word index of the id.
        word: usize,
    },

    /// A hex payload could not be decoded.
    #[error("invalid hex data: {0}")]
    InvalidHex(String),
}

/// A single ABI-encodable argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u64),
    Address(Address),
    Bool(bool),
    FixedBytes([u8; 32]),
    String(String),
}

/// Encode a function call: selector followed by the encoded arguments.
pub fn encode_call(selector: [u8; 4], tokens: &[Token]) -> Vec<u8> {
    let mut out = selector.to_vec();
    out.extend(encode_tokens(tokens));
    out
}

/// Encode a sequence of arguments as a top-level tuple.
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::Address(addr) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(addr.as_bytes());
                head.extend_from_slice(&word);
            }
            Token::Bool(flag) => head.extend_from_slice(&uint_word(u64::from(*flag))),
            Token::FixedBytes(bytes) => head.extend_from_slice(bytes),
            Token::String(text) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(text.len() as u64));
                tail.extend_from_slice(text.as_bytes());
                pad_to_word(&mut tail);
            }
        }
    }

    head.extend(tail);
    head
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn pad_to_word(buf: &mut Vec<u8>) {
    let rem = buf.len() % WORD;
    if rem != 0 {
        buf.resize(buf.len() + WORD - rem, 0);
    }
}

/// Word-addressed reader over ABI-encoded return data.
///
/// Offsets of dynamic values are relative to the start of the enclosing
/// tuple, which is the start of this decoder's slice.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let end = start.checked_add(len).ok_or(AbiError::OutOfBounds {
            needed: usize::MAX,
            len: self.data.len(),
        })?;
        self.data.get(start..end).ok_or(AbiError::OutOfBounds {
            needed: end,
            len: self.data.len(),
        })
    }

    fn word(&self, index: usize) -> Result<&'a [u8], AbiError> {
        self.slice(index * WORD, WORD)
    }

    fn u64_at(&self, start: usize, word: usize) -> Result<u64, AbiError> {
        let raw = self.slice(start, WORD)?;
        if raw[..24].iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow { word });
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&raw[24..]);
        Ok(u64::from_be_bytes(buf))
    }

    /// Read a `uint256` that must fit in `u64`.
    pub fn uint(&self, index: usize) -> Result<u64, AbiError> {
        self.u64_at(index * WORD, index)
    }

    /// Read an `address`.
    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        let raw = self.word(index)?;
        if raw[..12].iter().any(|b| *b != 0) {
            return Err(AbiError::InvalidAddress { word: index });
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw[12..]);
        Ok(Address::from_bytes(bytes))
    }

    /// Read a `bool`.
    pub fn bool(&self, index: usize) -> Result<bool, AbiError> {
        match self.uint(index) {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(AbiError::InvalidBool { word: index }),
        }
    }

    /// Read a `bytes32`.
    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], AbiError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.word(index)?);
        Ok(out)
    }

    fn offset(&self, index: usize) -> Result<usize, AbiError> {
        let raw = self.uint(index)?;
        usize::try_from(raw).map_err(|_| AbiError::Overflow { word: index })
    }

    /// Read a `string` whose offset sits in head word `index`.
    pub fn string(&self, index: usize) -> Result<String, AbiError> {
        let offset = self.offset(index)?;
        let len = self.u64_at(offset, index)?;
        let len = usize::try_from(len).map_err(|_| AbiError::Overflow { word: index })?;
        let bytes = self.slice(offset + WORD, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8 { word: index })
    }

    /// Descend into a dynamic tuple whose offset sits in head word `index`.
    pub fn tuple(&self, index: usize) -> Result<Decoder<'a>, AbiError> {
        let offset = self.offset(index)?;
        let data = self.data.get(offset..).ok_or(AbiError::OutOfBounds {
            needed: offset,
            len: self.data.len(),
        })?;
        Ok(Decoder { data })
    }
}

/// Extract the message from an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    Decoder::new(payload).string(0).ok()
}

/// Render bytes as `0x`-prefixed hex.
pub fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse `0x`-prefixed (or bare) hex into bytes.
pub fn from_hex_data(raw: &str) -> Result<Vec<u8>, AbiError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| AbiError::InvalidHex(format!("{raw:?}: {e}")))
}

/// Parse a `0x`-prefixed hex quantity (as used for block numbers).
pub fn parse_quantity(raw: &str) -> Result<u64, AbiError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| AbiError::InvalidHex(format!("{raw:?}: {e}")))
}

/// Render a `0x`-prefixed hex quantity.
pub fn quantity(value: u64) -> String {
    format!("{value:#x}")
}
