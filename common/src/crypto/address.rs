//! 20-byte L1 addresses derived from Ed25519 public keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use super::{Hash, PublicKey};

/// Size of an L1 address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Errors raised when parsing an address from its textual form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input did not decode to exactly [`ADDRESS_SIZE`] bytes.
    #[error("invalid address length: expected {ADDRESS_SIZE}, got {0}")]
    InvalidLength(usize),
    /// Input was not valid hex.
    #[error("invalid hex string: {0}")]
    HexError(String),
}

/// An L1 rollup address: the trailing 20 bytes of the Sha3-256 digest of an
/// Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Wrap raw bytes as an address.
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// The all-zero address.
    pub const fn zero() -> Self {
        Self([0u8; ADDRESS_SIZE])
    }

    /// Derive the address owned by a public key.
    pub fn from_public_key(public: &PublicKey) -> Self {
        let digest = Hash::digest(public.as_bytes());
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest.as_bytes()[super::HASH_SIZE - ADDRESS_SIZE..]);
        Self(bytes)
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Hex encoding with the conventional `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse an address from hex, with or without a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, AddressError> {
        let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(stripped).map_err(|e| AddressError::HexError(e.to_string()))?;
        if bytes.len() != ADDRESS_SIZE {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; ADDRESS_SIZE];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn keypair(byte: u8) -> Keypair {
        Keypair::from_seed([byte; 32])
    }

    #[test]
    fn test_address_is_stable_for_a_key() {
        let a = Address::from_public_key(&keypair(5).public());
        let b = Address::from_public_key(&keypair(5).public());
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_keys_distinct_addresses() {
        let a = Address::from_public_key(&keypair(1).public());
        let b = Address::from_public_key(&keypair(2).public());
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_uses_0x_prefix() {
        let address = Address::from_public_key(&keypair(3).public());
        let text = address.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + ADDRESS_SIZE * 2);
    }

    #[test]
    fn test_hex_round_trip_with_and_without_prefix() {
        let address = Address::from_public_key(&keypair(4).public());
        assert_eq!(Address::from_hex(&address.to_hex()).unwrap(), address);
        let bare = address.to_hex().trim_start_matches("0x").to_string();
        assert_eq!(Address::from_hex(&bare).unwrap(), address);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            Address::from_hex("0x1234"),
            Err(AddressError::InvalidLength(2))
        ));
        assert!(matches!(
            Address::from_hex("0xzz"),
            Err(AddressError::HexError(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let address = Address::from_public_key(&keypair(6).public());
        let json = serde_json::to_string(&address).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(address, back);
    }
}
