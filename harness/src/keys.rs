//! Deterministic node-identity derivation.
//!
//! Keys are a pure function of their index: the 32-byte Ed25519 seed is the
//! Sha3-256 digest of a domain tag and the index. Two runs of the same test
//! therefore see identical node identities without any secret ever being
//! persisted, which makes multi-run debugging of flaky network tests
//! reproducible.

use mesa_common::config::MAX_KEY_INDEX;
use mesa_common::crypto::{Address, Hash, Keypair};

use crate::error::ConfigurationError;

/// Domain tag for validator signing keys.
const NODE_KEY_DOMAIN: &[u8] = b"mesa/node-signing/v1";

/// Domain tag for peer-identity keys.
const PEER_ID_KEY_DOMAIN: &[u8] = b"mesa/peer-id/v1";

fn derive(domain: &[u8], index: u32) -> Keypair {
    let seed = Hash::digest_parts(&[domain, &index.to_be_bytes()]);
    Keypair::from_seed(*seed.as_bytes())
}

/// Derive the validator signing key at a single index.
pub fn derive_node_key(index: u32) -> Keypair {
    derive(NODE_KEY_DOMAIN, index)
}

/// Derive the peer-identity key at a single index.
pub fn derive_peer_id_key(index: u32) -> Keypair {
    derive(PEER_ID_KEY_DOMAIN, index)
}

fn check_range(start: u32, count: u32) -> Result<(), ConfigurationError> {
    let end = start as u64 + count as u64;
    if count == 0 || end > MAX_KEY_INDEX as u64 + 1 {
        return Err(ConfigurationError::InvalidRange {
            start,
            count,
            max: MAX_KEY_INDEX,
        });
    }
    Ok(())
}

/// Derive `count` validator signing keys for indices
/// `start_index..start_index + count`, in order.
pub fn derive_node_keys(
    start_index: u32,
    count: u32,
) -> Result<Vec<Keypair>, ConfigurationError> {
    check_range(start_index, count)?;
    Ok((start_index..start_index + count)
        .map(derive_node_key)
        .collect())
}

/// Derive `count` peer-identity keys for indices `1..=count`, in order.
pub fn derive_peer_id_keys(count: u32) -> Result<Vec<Keypair>, ConfigurationError> {
    check_range(1, count)?;
    Ok((1..=count).map(derive_peer_id_key).collect())
}

/// The full identity of one validator node.
///
/// Created once per harness instance, immutable, and never persisted beyond
/// process memory.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    index: u32,
    signing: Keypair,
    peer_id: Keypair,
}

impl NodeIdentity {
    /// Assemble an identity from its derived parts.
    pub fn new(index: u32, signing: Keypair, peer_id: Keypair) -> Self {
        Self {
            index,
            signing,
            peer_id,
        }
    }

    /// Index this identity was derived from.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Validator signing keypair.
    pub fn signing(&self) -> &Keypair {
        &self.signing
    }

    /// Peer-identity keypair for the discovery layer.
    pub fn peer_id(&self) -> &Keypair {
        &self.peer_id
    }

    /// The L1 address registered for this validator.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.signing.public())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_count_and_order() {
        let keys = derive_node_keys(1, 4).unwrap();
        assert_eq!(keys.len(), 4);
        for (offset, key) in keys.iter().enumerate() {
            let expected = derive_node_key(1 + offset as u32);
            assert_eq!(key.public(), expected.public());
        }
    }

    #[test]
    fn test_two_invocations_are_identical() {
        let first = derive_node_keys(1, 8).unwrap();
        let second = derive_node_keys(1, 8).unwrap();
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.public(), b.public());
        }
        let first = derive_peer_id_keys(8).unwrap();
        let second = derive_peer_id_keys(8).unwrap();
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.public(), b.public());
        }
    }

    #[test]
    fn test_keys_are_pairwise_distinct() {
        let keys = derive_node_keys(1, 16).unwrap();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a.public(), b.public());
            }
        }
    }

    #[test]
    fn test_signing_and_peer_domains_are_separated() {
        assert_ne!(
            derive_node_key(1).public(),
            derive_peer_id_key(1).public()
        );
    }

    #[test]
    fn test_zero_count_is_invalid_range() {
        assert!(matches!(
            derive_node_keys(1, 0),
            Err(ConfigurationError::InvalidRange { count: 0, .. })
        ));
        assert!(matches!(
            derive_peer_id_keys(0),
            Err(ConfigurationError::InvalidRange { count: 0, .. })
        ));
    }

    #[test]
    fn test_overflowing_range_is_invalid() {
        assert!(matches!(
            derive_node_keys(MAX_KEY_INDEX, 2),
            Err(ConfigurationError::InvalidRange { .. })
        ));
        // The last index of the space is still usable.
        assert!(derive_node_keys(MAX_KEY_INDEX, 1).is_ok());
    }

    #[test]
    fn test_identity_address_matches_signing_key() {
        let identity = NodeIdentity::new(3, derive_node_key(3), derive_peer_id_key(3));
        assert_eq!(
            identity.address(),
            Address::from_public_key(&derive_node_key(3).public())
        );
        assert_eq!(identity.index(), 3);
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(index in 0u32..=MAX_KEY_INDEX) {
            prop_assert_eq!(
                derive_node_key(index).public(),
                derive_node_key(index).public()
            );
            prop_assert_eq!(
                derive_peer_id_key(index).public(),
                derive_peer_id_key(index).public()
            );
        }

        #[test]
        fn prop_distinct_indices_distinct_keys(
            a in 0u32..=MAX_KEY_INDEX,
            b in 0u32..=MAX_KEY_INDEX,
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(derive_node_key(a).public(), derive_node_key(b).public());
        }
    }
}
