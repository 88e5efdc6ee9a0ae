//! 32-byte Sha3-256 hash used for addresses, transaction ids and
//! configuration digests.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::fmt;
use thiserror::Error;

/// Size of a hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Errors raised when parsing a hash from its textual form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Input did not decode to exactly [`HASH_SIZE`] bytes.
    #[error("invalid hash length: expected {HASH_SIZE}, got {0}")]
    InvalidLength(usize),
    /// Input was not valid hex.
    #[error("invalid hex string: {0}")]
    HexError(String),
}

/// A 32-byte Sha3-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Wrap raw bytes as a hash.
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// The all-zero hash.
    pub const fn zero() -> Self {
        Self([0u8; HASH_SIZE])
    }

    /// Hash arbitrary bytes with Sha3-256.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hash the concatenation of several byte slices.
    pub fn digest_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha3_256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Raw bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Hex encoding, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hash from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(hex_str).map_err(|e| HashError::HexError(e.to_string()))?;
        if bytes.len() != HASH_SIZE {
            return Err(HashError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
