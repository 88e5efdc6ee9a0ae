//! Composable, cached test-environment setup.
//!
//! Test code registers named setup steps against a [`SnapshotManager`]; the
//! manager applies them in registration order over a shared
//! [`NetworkContext`], or restores a previously captured
//! [`SnapshotRecord`](store::SnapshotRecord) instead of re-executing an
//! expensive step. Teardown releases resources in reverse order,
//! best-effort, and reports every failure instead of stopping at the first.

mod context;
mod manager;
mod store;

pub use context::NetworkContext;
pub use manager::{SnapshotManager, TeardownFailure, TeardownReport};
pub use store::{SnapshotRecord, SnapshotStore};
