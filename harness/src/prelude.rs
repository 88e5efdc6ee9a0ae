//! Convenient re-exports for common usage.

pub use crate::chain::{
    ChainError, ChainSnapshot, DevChain, DevChainBuilder, MiningMode, RollupChain, TxHash,
    WarpError,
};
pub use crate::config::{HarnessConfig, ValidatorNodeConfig, DATA_PATH_ENV};
pub use crate::error::ConfigurationError;
pub use crate::keys::{derive_node_keys, derive_peer_id_keys, NodeIdentity};
pub use crate::logger::ScopedLogger;
pub use crate::network::NetworkHarness;
pub use crate::node::{BootstrapNode, NodeError, ValidatorNode};
pub use crate::protocol::{ProtocolError, ValidatorBootstrapProtocol};
pub use crate::snapshot::{NetworkContext, SnapshotManager, TeardownReport};
