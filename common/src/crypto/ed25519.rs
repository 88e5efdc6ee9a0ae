//! Ed25519 node-identity keys.
//!
//! Every node in a Mesa network carries two Ed25519 keypairs: a signing key
//! used for validator duties and a peer-identity key used by the discovery
//! layer. Secrets are zeroized on drop and never printed.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an Ed25519 secret key in bytes.
pub const ED25519_SECRET_KEY_SIZE: usize = SECRET_KEY_LENGTH;

/// Size of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = SIGNATURE_LENGTH;

/// Error types for Ed25519 operations.
#[derive(Error, Debug, Clone)]
pub enum Ed25519Error {
    /// Invalid secret key length.
    #[error(
        "Invalid secret key length: expected {}, got {}",
        ED25519_SECRET_KEY_SIZE,
        _0
    )]
    InvalidSecretKeyLength(usize),

    /// Invalid public key length.
    #[error(
        "Invalid public key length: expected {}, got {}",
        ED25519_PUBLIC_KEY_SIZE,
        _0
    )]
    InvalidPublicKeyLength(usize),

    /// Failed to parse public key bytes.
    #[error("Failed to parse public key")]
    InvalidPublicKey,

    /// Signature verification failed.
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Hex decoding error.
    #[error("Invalid hex string: {0}")]
    HexError(String),
}

/// Ed25519 secret key (32 bytes).
///
/// The secret key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; ED25519_SECRET_KEY_SIZE]);

impl SecretKey {
    /// Create a secret key from raw bytes.
    pub fn from_bytes(bytes: [u8; ED25519_SECRET_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a secret key from a slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, Ed25519Error> {
        if slice.len() != ED25519_SECRET_KEY_SIZE {
            return Err(Ed25519Error::InvalidSecretKeyLength(slice.len()));
        }
        let mut bytes = [0u8; ED25519_SECRET_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the raw bytes of the secret key.
    pub fn as_bytes(&self) -> &[u8; ED25519_SECRET_KEY_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; ED25519_PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Create a public key from raw bytes, validating the curve point.
    pub fn from_bytes(bytes: [u8; ED25519_PUBLIC_KEY_SIZE]) -> Result<Self, Ed25519Error> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| Ed25519Error::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), Ed25519Error> {
        let key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| Ed25519Error::InvalidPublicKey)?;
        let sig = DalekSignature::from_bytes(&signature.0);
        key.verify(message, &sig)
            .map_err(|_| Ed25519Error::VerificationFailed)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != ED25519_PUBLIC_KEY_SIZE {
            return Err(serde::de::Error::custom(
                Ed25519Error::InvalidPublicKeyLength(bytes.len()),
            ));
        }
        let mut out = [0u8; ED25519_PUBLIC_KEY_SIZE];
        out.copy_from_slice(&bytes);
        PublicKey::from_bytes(out).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; ED25519_SIGNATURE_SIZE]);

impl Signature {
    /// Get the raw bytes of the signature.
    pub fn as_bytes(&self) -> &[u8; ED25519_SIGNATURE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// An Ed25519 keypair built from a 32-byte seed.
///
/// The public half is derived on demand; only the seed is held.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
}

impl Keypair {
    /// Build a keypair from a 32-byte seed. Any 32 bytes are a valid seed.
    pub fn from_seed(seed: [u8; ED25519_SECRET_KEY_SIZE]) -> Self {
        Self {
            secret: SecretKey::from_bytes(seed),
        }
    }

    /// The secret half.
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// The public half.
    pub fn public(&self) -> PublicKey {
        let signing = SigningKey::from_bytes(self.secret.as_bytes());
        PublicKey(signing.verifying_key().to_bytes())
    }

    /// Sign a message with the secret key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing = SigningKey::from_bytes(self.secret.as_bytes());
        Signature(signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public().to_hex())
            .finish()
    }
}
