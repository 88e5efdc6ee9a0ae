//! Shared primitives for the Mesa validator network.
//!
//! Cryptographic identity types (Ed25519 node keys, L1 addresses, Sha3
//! hashing) and the protocol constants every other Mesa crate builds on.

pub mod config;
pub mod crypto;
