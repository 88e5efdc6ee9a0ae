//! In-memory rollup chain for harness runs.
//!
//! `DevChain` models the slice of L1 behavior the bootstrap protocol
//! depends on: sequential transaction mining, epoch-gated validator
//! activation, and a time-warp whose effect only becomes visible once the
//! next transaction mines a block. Fault-injection knobs let tests exercise
//! the failure paths without a real chain.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::time::Duration;

use async_trait::async_trait;
use mesa_common::config::{EPOCH_DURATION, L1_SLOT_DURATION};
use mesa_common::crypto::{Address, Hash};

use super::{ChainError, ChainSnapshot, RollupChain, TxHash, WarpError};

/// How often a pending receipt is re-checked while waiting.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How the chain produces blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiningMode {
    /// A block is mined per submitted transaction; chain time stands still
    /// between transactions.
    OnDemand,
    /// A block is mined per submitted transaction *and* chain time advances
    /// by one slot per block, as if real time had passed between intervals.
    /// This is the mode in which a warp target can already be in the past.
    Interval,
}

/// One validator registration and the slot from which it is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Registration {
    address: Address,
    activation_slot: u64,
}

/// The whole ledger. Serializable so the snapshot manager can capture and
/// restore it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ledger {
    genesis_timestamp: u64,
    slot_duration: u64,
    epoch_duration: u64,
    /// Timestamp of the last mined block; the chain time reads observe.
    timestamp: u64,
    /// Warp target not yet realized by a block.
    pending_timestamp: Option<u64>,
    height: u64,
    registrations: Vec<Registration>,
    mined: BTreeSet<TxHash>,
    next_tx_id: u64,
}

impl Ledger {
    fn slot_at(&self, timestamp: u64) -> u64 {
        timestamp.saturating_sub(self.genesis_timestamp) / self.slot_duration
    }

    fn current_slot(&self) -> u64 {
        self.slot_at(self.timestamp)
    }

    /// Slot at which a registration made now becomes active: the first slot
    /// of the next epoch. Committee membership is evaluated at epoch
    /// boundaries, not on registration.
    fn next_epoch_boundary_slot(&self) -> u64 {
        let epoch = self.current_slot() / self.epoch_duration;
        (epoch + 1) * self.epoch_duration
    }

    fn mine(&mut self, auto_advance: u64) {
        self.height += 1;
        let mut timestamp = self.timestamp + auto_advance;
        if let Some(pending) = self.pending_timestamp.take() {
            timestamp = timestamp.max(pending);
        }
        self.timestamp = timestamp;
    }

    fn next_tx_hash(&mut self) -> TxHash {
        let id = self.next_tx_id;
        self.next_tx_id += 1;
        Hash::digest_parts(&[b"mesa/tx/v1", &id.to_be_bytes()])
    }
}

/// Injected failures, outside the snapshotted ledger.
#[derive(Debug, Default)]
struct Faults {
    revert_next_registration: bool,
    next_warp_failure: Option<String>,
    stall_receipts: bool,
}

/// In-memory [`RollupChain`] implementation.
pub struct DevChain {
    mode: MiningMode,
    ledger: RwLock<Ledger>,
    faults: RwLock<Faults>,
}

impl DevChain {
    fn auto_advance(&self) -> u64 {
        match self.mode {
            MiningMode::OnDemand => 0,
            MiningMode::Interval => self.ledger.read().slot_duration,
        }
    }

    fn submit(&self) -> TxHash {
        let stalled = self.faults.read().stall_receipts;
        let auto = self.auto_advance();
        let mut ledger = self.ledger.write();
        let tx = ledger.next_tx_hash();
        if !stalled {
            ledger.mine(auto);
            ledger.mined.insert(tx);
        }
        tx
    }

    /// Timestamp of the last mined block.
    pub fn visible_timestamp(&self) -> u64 {
        self.ledger.read().timestamp
    }

    /// Current block height.
    pub fn height(&self) -> u64 {
        self.ledger.read().height
    }

    // ========================================================================
    // Cheat methods for tests
    // ========================================================================

    /// Mine a block at `timestamp`, moving visible chain time there
    /// directly. Simulates a chain that kept producing blocks on its own.
    pub fn force_time(&self, timestamp: u64) {
        let mut ledger = self.ledger.write();
        ledger.pending_timestamp = Some(timestamp);
        ledger.mine(0);
    }

    /// Make the next registration transaction revert.
    pub fn revert_next_registration(&self) {
        self.faults.write().revert_next_registration = true;
    }

    /// Make the next warp call fail with an rpc error carrying `reason`.
    pub fn fail_next_warp(&self, reason: &str) {
        self.faults.write().next_warp_failure = Some(reason.to_string());
    }

    /// While set, submitted transactions are never mined, so receipt waits
    /// run into their timeout.
    pub fn stall_receipts(&self, stalled: bool) {
        self.faults.write().stall_receipts = stalled;
    }
}

#[async_trait]
impl RollupChain for DevChain {
    async fn add_validator(&self, address: Address) -> Result<TxHash, ChainError> {
        if std::mem::take(&mut self.faults.write().revert_next_registration) {
            return Err(ChainError::Reverted(format!(
                "registration of {address} reverted"
            )));
        }
        {
            let ledger = self.ledger.read();
            if ledger.registrations.iter().any(|r| r.address == address) {
                return Err(ChainError::Reverted(format!(
                    "{address} is already registered"
                )));
            }
        }
        let tx = self.submit();
        let mut ledger = self.ledger.write();
        let activation_slot = ledger.next_epoch_boundary_slot();
        ledger.registrations.push(Registration {
            address,
            activation_slot,
        });
        Ok(tx)
    }

    async fn epoch_duration(&self) -> Result<u64, ChainError> {
        Ok(self.ledger.read().epoch_duration)
    }

    async fn timestamp_for_slot(&self, slot: u64) -> Result<u64, ChainError> {
        let ledger = self.ledger.read();
        slot.checked_mul(ledger.slot_duration)
            .and_then(|offset| ledger.genesis_timestamp.checked_add(offset))
            .ok_or_else(|| ChainError::Rpc(format!("timestamp for slot {slot} overflows")))
    }

    async fn warp(&self, timestamp: u64) -> Result<(), WarpError> {
        if let Some(reason) = self.faults.write().next_warp_failure.take() {
            return Err(WarpError::Rpc(reason));
        }
        let mut ledger = self.ledger.write();
        let current = ledger.timestamp;
        if timestamp <= current {
            return Err(WarpError::AlreadyPastTarget {
                current,
                target: timestamp,
            });
        }
        // Takes effect when the next block is mined, not immediately.
        let pending = ledger.pending_timestamp.unwrap_or(0);
        ledger.pending_timestamp = Some(pending.max(timestamp));
        Ok(())
    }

    async fn send_settlement(&self) -> Result<TxHash, ChainError> {
        let tx = self.submit();
        Ok(tx)
    }

    async fn wait_for_receipt(&self, tx: TxHash, timeout: Duration) -> Result<(), ChainError> {
        let mined = tokio::time::timeout(timeout, async {
            loop {
                if self.ledger.read().mined.contains(&tx) {
                    return;
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        })
        .await;
        mined.map_err(|_| ChainError::ReceiptTimeout {
            tx,
            waited: timeout,
        })
    }

    async fn active_validators(&self) -> Result<Vec<Address>, ChainError> {
        let ledger = self.ledger.read();
        let current_slot = ledger.current_slot();
        Ok(ledger
            .registrations
            .iter()
            .filter(|r| r.activation_slot <= current_slot)
            .map(|r| r.address)
            .collect())
    }

    async fn capture(&self) -> Result<ChainSnapshot, ChainError> {
        let ledger = self.ledger.read();
        serde_json::to_value(&*ledger)
            .map(ChainSnapshot)
            .map_err(|e| ChainError::Snapshot(e.to_string()))
    }

    async fn restore(&self, snapshot: ChainSnapshot) -> Result<(), ChainError> {
        let ledger: Ledger =
            serde_json::from_value(snapshot.0).map_err(|e| ChainError::Snapshot(e.to_string()))?;
        *self.ledger.write() = ledger;
        Ok(())
    }
}

/// Builder for [`DevChain`] instances.
///
/// Defaults match the protocol constants: 12 s slots, 32-slot epochs,
/// on-demand mining, genesis at time zero.
pub struct DevChainBuilder {
    slot_duration: u64,
    epoch_duration: u64,
    genesis_timestamp: u64,
    mode: MiningMode,
    genesis_validators: Vec<Address>,
}

impl DevChainBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            slot_duration: L1_SLOT_DURATION,
            epoch_duration: EPOCH_DURATION,
            genesis_timestamp: 0,
            mode: MiningMode::OnDemand,
            genesis_validators: Vec::new(),
        }
    }

    /// Set the slot duration in seconds.
    pub fn with_slot_duration(mut self, seconds: u64) -> Self {
        self.slot_duration = seconds;
        self
    }

    /// Set the number of slots per epoch.
    pub fn with_epoch_duration(mut self, slots: u64) -> Self {
        self.epoch_duration = slots;
        self
    }

    /// Set the mining mode.
    pub fn with_mining_mode(mut self, mode: MiningMode) -> Self {
        self.mode = mode;
        self
    }

    /// Register a validator that is active from genesis (slot 0).
    pub fn with_genesis_validator(mut self, address: Address) -> Self {
        self.genesis_validators.push(address);
        self
    }

    /// Build the chain.
    pub fn build(self) -> DevChain {
        let registrations = self
            .genesis_validators
            .into_iter()
            .map(|address| Registration {
                address,
                activation_slot: 0,
            })
            .collect();
        DevChain {
            mode: self.mode,
            ledger: RwLock::new(Ledger {
                genesis_timestamp: self.genesis_timestamp,
                slot_duration: self.slot_duration,
                epoch_duration: self.epoch_duration,
                timestamp: self.genesis_timestamp,
                pending_timestamp: None,
                height: 0,
                registrations,
                mined: BTreeSet::new(),
                next_tx_id: 0,
            }),
            faults: RwLock::new(Faults::default()),
        }
    }
}

impl Default for DevChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesa_common::crypto::Keypair;

    fn address(byte: u8) -> Address {
        Address::from_public_key(&Keypair::from_seed([byte; 32]).public())
    }

    #[tokio::test]
    async fn test_registration_activates_at_next_epoch_boundary() {
        let chain = DevChainBuilder::new().build();
        let validator = address(1);

        let tx = chain.add_validator(validator).await.unwrap();
        chain
            .wait_for_receipt(tx, Duration::from_secs(1))
            .await
            .unwrap();

        // Registered but the epoch boundary has not been crossed.
        assert!(chain.active_validators().await.unwrap().is_empty());

        // Warp to the first slot of the next epoch, then settle.
        let target = chain
            .timestamp_for_slot(chain.epoch_duration().await.unwrap())
            .await
            .unwrap();
        chain.warp(target).await.unwrap();

        // Warp alone is not observable yet.
        assert!(chain.active_validators().await.unwrap().is_empty());

        let tx = chain.send_settlement().await.unwrap();
        chain
            .wait_for_receipt(tx, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(chain.active_validators().await.unwrap(), vec![validator]);
    }

    #[tokio::test]
    async fn test_warp_rejects_target_already_reached() {
        let chain = DevChainBuilder::new().build();
        chain.force_time(10_000);

        let err = chain.warp(500).await.unwrap_err();
        assert!(matches!(
            err,
            WarpError::AlreadyPastTarget {
                current: 10_000,
                target: 500
            }
        ));
    }

    #[tokio::test]
    async fn test_injected_warp_failure_wins_once() {
        let chain = DevChainBuilder::new().build();
        chain.fail_next_warp("connection refused");

        assert!(matches!(
            chain.warp(100).await.unwrap_err(),
            WarpError::Rpc(reason) if reason == "connection refused"
        ));
        // The fault is consumed; the next warp behaves normally.
        chain.warp(100).await.unwrap();
    }

    #[tokio::test]
    async fn test_interval_mode_advances_time_per_block() {
        let chain = DevChainBuilder::new()
            .with_mining_mode(MiningMode::Interval)
            .build();
        assert_eq!(chain.visible_timestamp(), 0);

        chain.send_settlement().await.unwrap();
        chain.send_settlement().await.unwrap();
        assert_eq!(chain.visible_timestamp(), 2 * L1_SLOT_DURATION);
        assert_eq!(chain.height(), 2);
    }

    #[tokio::test]
    async fn test_reverted_registration_and_duplicate() {
        let chain = DevChainBuilder::new().build();
        chain.revert_next_registration();
        assert!(matches!(
            chain.add_validator(address(1)).await.unwrap_err(),
            ChainError::Reverted(_)
        ));

        chain.add_validator(address(1)).await.unwrap();
        assert!(matches!(
            chain.add_validator(address(1)).await.unwrap_err(),
            ChainError::Reverted(_)
        ));
    }

    #[tokio::test]
    async fn test_stalled_receipt_times_out() {
        let chain = DevChainBuilder::new().build();
        chain.stall_receipts(true);

        let tx = chain.send_settlement().await.unwrap();
        let err = chain
            .wait_for_receipt(tx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::ReceiptTimeout { .. }));
    }

    #[tokio::test]
    async fn test_capture_restore_round_trip() {
        let chain = DevChainBuilder::new().build();
        chain.add_validator(address(1)).await.unwrap();
        let snapshot = chain.capture().await.unwrap();
        let height = chain.height();

        chain.add_validator(address(2)).await.unwrap();
        assert_eq!(chain.height(), height + 1);

        chain.restore(snapshot).await.unwrap();
        assert_eq!(chain.height(), height);
        let ledger = chain.ledger.read();
        assert_eq!(ledger.registrations.len(), 1);
    }

    #[tokio::test]
    async fn test_genesis_validator_is_active_immediately() {
        let chain = DevChainBuilder::new()
            .with_genesis_validator(address(9))
            .build();
        assert_eq!(chain.active_validators().await.unwrap(), vec![address(9)]);
    }

    #[tokio::test]
    async fn test_timestamp_for_slot_overflow_is_an_error() {
        let chain = DevChainBuilder::new().build();
        assert!(matches!(
            chain.timestamp_for_slot(u64::MAX).await.unwrap_err(),
            ChainError::Rpc(_)
        ));
    }
}
