// L1 block time in seconds. One slot per L1 block.
pub const L1_SLOT_DURATION: u64 = 12;

// Slots per epoch on the rollup contract. Validator committees are held
// constant for a whole epoch and re-evaluated only at epoch boundaries.
pub const EPOCH_DURATION: u64 = 32;

// Upper bound of the derived-key index space. Node identities are derived
// from indices in [0, MAX_KEY_INDEX]; anything beyond is a configuration
// error, not a runtime condition.
pub const MAX_KEY_INDEX: u32 = 0xFFFF;

// Index of the designated publisher key. The publisher funds settlement
// transactions and provides the initial validator address at deployment.
pub const PUBLISHER_KEY_INDEX: u32 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_spans_multiple_slots() {
        assert!(EPOCH_DURATION > 1);
        assert!(L1_SLOT_DURATION > 0);
    }

    #[test]
    fn test_publisher_index_inside_key_space() {
        assert!(PUBLISHER_KEY_INDEX < MAX_KEY_INDEX);
    }
}
