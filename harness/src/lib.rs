//! # Mesa Harness
//!
//! Snapshot-based, composable end-to-end test harness for Mesa validator
//! networks.
//!
//! The harness deterministically provisions node identities, drives the
//! L1-anchored validator-registration and epoch-advancement protocol, and
//! manages the start/stop lifecycle of bootstrap and validator node
//! processes, so distributed-protocol behavior can be exercised repeatably.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mesa_harness::prelude::*;
//!
//! #[tokio::test]
//! async fn test_four_validators() {
//!     let mut harness = NetworkHarness::create("four_validators", 4, None)
//!         .await
//!         .unwrap();
//!     harness.apply_base_snapshots().await.unwrap();
//!     let nodes = harness.setup().await.unwrap();
//!
//!     // Exercise the network...
//!
//!     harness.stop_nodes(&nodes).await.unwrap();
//!     let report = harness.teardown().await;
//!     assert!(report.is_empty());
//! }
//! ```
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: node identities are pure functions of their index
//! 2. **Cached**: expensive on-chain setup runs at most once per distinct
//!    configuration, restored from snapshot records afterwards
//! 3. **Sequential**: chain and node operations are awaited one at a time,
//!    keeping nonces ordered and logs readable
//! 4. **Recoverable**: teardown is reverse-ordered and best-effort, and
//!    reports every failure instead of stopping at the first

#![warn(missing_docs)]
#![warn(clippy::all)]

/// L1 chain collaborator boundary and the in-memory dev chain.
pub mod chain;
/// Harness and validator-node configuration.
pub mod config;
/// Harness-level error taxonomy.
pub mod error;
/// Deterministic node-identity derivation.
pub mod keys;
/// Per-harness scoped logging.
pub mod logger;
/// Top-level network lifecycle controller.
pub mod network;
/// In-process bootstrap and validator node handles.
pub mod node;
/// Validator committee bootstrap protocol.
pub mod protocol;
/// Composable, cached setup steps.
pub mod snapshot;

pub mod prelude;

pub use network::NetworkHarness;
pub use snapshot::{NetworkContext, SnapshotManager, TeardownReport};

/// Harness version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
