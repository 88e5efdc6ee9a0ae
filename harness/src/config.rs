//! Harness and node configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::time::Duration;

use mesa_common::config::{EPOCH_DURATION, L1_SLOT_DURATION};

use crate::chain::MiningMode;

/// Environment variable naming a directory for cross-run snapshot records.
/// When unset, records live only in process memory.
pub const DATA_PATH_ENV: &str = "MESA_E2E_DATA_PATH";

/// Configuration of one harness instance.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// L1 slot duration in seconds.
    pub slot_duration: u64,
    /// Slots per epoch on the rollup contract.
    pub epoch_duration: u64,
    /// Bound on every transaction-receipt wait.
    pub receipt_timeout: Duration,
    /// Mining mode of the dev chain.
    pub mining_mode: MiningMode,
    /// Directory for persisted snapshot records, if any.
    pub data_dir: Option<PathBuf>,
    /// Block-production batch bounds applied to every validator node
    /// *after* snapshot restoration, so cached records never embed
    /// per-test tuning.
    pub min_txs_per_block: u64,
    /// See [`min_txs_per_block`](HarnessConfig::min_txs_per_block).
    pub max_txs_per_block: u64,
}

impl HarnessConfig {
    /// Defaults, with the snapshot data directory taken from
    /// [`DATA_PATH_ENV`] when set.
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var_os(DATA_PATH_ENV).map(PathBuf::from),
            ..Self::default()
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            slot_duration: L1_SLOT_DURATION,
            epoch_duration: EPOCH_DURATION,
            receipt_timeout: Duration::from_secs(30),
            mining_mode: MiningMode::OnDemand,
            data_dir: None,
            min_txs_per_block: 4,
            max_txs_per_block: 4,
        }
    }
}

/// Configuration every validator node is started with.
///
/// Embedded in snapshot records, so only state that is stable across test
/// runs belongs here; per-test tuning is applied by the controller after
/// restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorNodeConfig {
    /// Discoverable record of the bootstrap node to dial first.
    pub bootstrap_record: String,
    /// Lower block-production batch bound, if fixed.
    pub min_txs_per_block: Option<u64>,
    /// Upper block-production batch bound, if fixed.
    pub max_txs_per_block: Option<u64>,
}

impl ValidatorNodeConfig {
    /// Node configuration pointing at the given bootstrap record.
    pub fn new(bootstrap_record: impl Into<String>) -> Self {
        Self {
            bootstrap_record: bootstrap_record.into(),
            min_txs_per_block: None,
            max_txs_per_block: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_track_protocol_constants() {
        let config = HarnessConfig::default();
        assert_eq!(config.slot_duration, L1_SLOT_DURATION);
        assert_eq!(config.epoch_duration, EPOCH_DURATION);
        assert_eq!(config.mining_mode, MiningMode::OnDemand);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_node_config_serde_round_trip() {
        let mut config = ValidatorNodeConfig::new("enr:-abc");
        config.min_txs_per_block = Some(4);
        let json = serde_json::to_string(&config).unwrap();
        let back: ValidatorNodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_from_env_reads_data_path() {
        std::env::set_var(DATA_PATH_ENV, "/tmp/mesa-e2e");
        let config = HarnessConfig::from_env();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/mesa-e2e")));
        std::env::remove_var(DATA_PATH_ENV);
    }
}
