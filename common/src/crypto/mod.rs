//! Cryptographic primitives for Mesa node identity.

pub mod address;
pub mod ed25519;
pub mod hash;

pub use address::{Address, ADDRESS_SIZE};
pub use ed25519::{Keypair, PublicKey, SecretKey, Signature};
pub use hash::{Hash, HASH_SIZE};
