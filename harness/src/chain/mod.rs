//! L1 rollup chain collaborator boundary.
//!
//! The harness never talks to a concrete chain directly: everything flows
//! through [`RollupChain`], which covers the four capabilities the protocol
//! needs from an L1: contract writes with awaitable confirmation, contract
//! reads for constants and derived timestamps, a time-warp whose
//! already-past-target outcome is a *typed* condition, and bounded receipt
//! waiting. [`DevChain`] is the in-memory implementation harness runs use.

mod dev;

pub use dev::{DevChain, DevChainBuilder, MiningMode};

use async_trait::async_trait;
use mesa_common::crypto::{Address, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

/// Hash identifying a transaction submitted to the L1 chain.
pub type TxHash = Hash;

/// Failures surfaced by chain reads and writes.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A contract write was mined but reverted.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// The chain endpoint failed to serve the request.
    #[error("rpc failure: {0}")]
    Rpc(String),

    /// A receipt did not appear within the bounded wait.
    #[error("receipt for {tx} not observed within {waited:?}")]
    ReceiptTimeout { tx: TxHash, waited: Duration },

    /// Ledger state could not be captured or restored.
    #[error("chain snapshot failed: {0}")]
    Snapshot(String),
}

/// Failures of the time-warp call.
///
/// `AlreadyPastTarget` is its own variant so callers can tell the benign
/// race (the chain reached the target on its own, e.g. under interval
/// mining) apart from a genuinely broken warp, without string matching
/// against error messages.
#[derive(Error, Debug)]
pub enum WarpError {
    /// The chain clock already reached or passed the requested target.
    #[error("chain time {current} already at or past warp target {target}")]
    AlreadyPastTarget { current: u64, target: u64 },

    /// The chain endpoint failed to serve the warp request.
    #[error("rpc failure: {0}")]
    Rpc(String),
}

/// Opaque capture of a chain's full ledger state.
///
/// Produced by [`RollupChain::capture`] and meaningful only to the
/// implementation that produced it; the snapshot manager stores and replays
/// it without inspecting the contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot(pub(crate) serde_json::Value);

/// The L1 chain as seen by the harness.
#[async_trait]
pub trait RollupChain: Send + Sync {
    /// Submit a transaction registering `address` as a validator on the
    /// rollup contract. Confirmation is awaited separately via
    /// [`wait_for_receipt`](RollupChain::wait_for_receipt).
    async fn add_validator(&self, address: Address) -> Result<TxHash, ChainError>;

    /// Read the contract's epoch-duration constant (slots per epoch).
    async fn epoch_duration(&self) -> Result<u64, ChainError>;

    /// Read the L1 timestamp corresponding to the start of `slot`.
    async fn timestamp_for_slot(&self, slot: u64) -> Result<u64, ChainError>;

    /// Advance chain time to `timestamp`.
    async fn warp(&self, timestamp: u64) -> Result<(), WarpError>;

    /// Submit a minimal value transfer from the publisher account. Used to
    /// force a block so that a prior warp becomes observable.
    async fn send_settlement(&self) -> Result<TxHash, ChainError>;

    /// Wait until `tx` is mined, at most `timeout`.
    async fn wait_for_receipt(&self, tx: TxHash, timeout: Duration) -> Result<(), ChainError>;

    /// Read the validator set that is active as of the current chain time.
    async fn active_validators(&self) -> Result<Vec<Address>, ChainError>;

    /// Capture the full ledger state for later [`restore`](RollupChain::restore).
    async fn capture(&self) -> Result<ChainSnapshot, ChainError>;

    /// Replace the ledger state with a previously captured snapshot.
    async fn restore(&self, snapshot: ChainSnapshot) -> Result<(), ChainError>;
}
