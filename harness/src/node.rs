//! In-process bootstrap and validator node handles.
//!
//! These model the process collaborator the harness drives: `start` brings
//! a node up and returns a handle, `stop` takes it down exactly once, and
//! the bootstrap node publishes a discoverable record other nodes dial.
//! A handle that is never stopped is a leak; the controller's teardown
//! asserts against it.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

use mesa_common::crypto::{Address, Keypair, PublicKey};

use crate::config::ValidatorNodeConfig;
use crate::keys::NodeIdentity;
use crate::logger::ScopedLogger;

/// Node lifecycle failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// `stop` was called on a node that is already stopped.
    #[error("node '{0}' is already stopped")]
    AlreadyStopped(String),

    /// The node could not come up.
    #[error("node '{0}' failed to start: {1}")]
    StartFailed(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Running,
    Stopped,
}

fn encode_record(public: &PublicKey, port: u16) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.extend_from_slice(public.as_bytes());
    payload.extend_from_slice(&port.to_be_bytes());
    format!("enr:-{}", hex::encode(payload))
}

/// The discovery entry point of a network: one long-lived node every
/// validator dials first.
pub struct BootstrapNode {
    name: String,
    port: u16,
    record: String,
    state: Mutex<NodeState>,
    logger: ScopedLogger,
}

impl BootstrapNode {
    /// Start a bootstrap node on `port` identified by `peer_key`.
    pub async fn start(
        port: u16,
        peer_key: &Keypair,
        logger: &ScopedLogger,
    ) -> Result<Arc<Self>, NodeError> {
        let name = format!("bootstrap:{port}");
        let record = encode_record(&peer_key.public(), port);
        let logger = logger.child("bootstrap");
        logger.debug(format!("bootstrap node listening on port {port}"));
        Ok(Arc::new(Self {
            name,
            port,
            record,
            state: Mutex::new(NodeState::Running),
            logger,
        }))
    }

    /// The discoverable record peers use to locate this node.
    pub fn record(&self) -> &str {
        &self.record
    }

    /// Port the node is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the node process is up.
    pub fn is_running(&self) -> bool {
        *self.state.lock() == NodeState::Running
    }

    /// Stop the node. Fails if it was already stopped.
    pub async fn stop(&self) -> Result<(), NodeError> {
        let mut state = self.state.lock();
        if *state == NodeState::Stopped {
            return Err(NodeError::AlreadyStopped(self.name.clone()));
        }
        *state = NodeState::Stopped;
        self.logger.debug("bootstrap node stopped");
        Ok(())
    }
}

/// One validator node process, constructed from its identity and the
/// bootstrap node's record.
pub struct ValidatorNode {
    name: String,
    index: u32,
    address: Address,
    state: Mutex<NodeState>,
    logger: ScopedLogger,
}

impl std::fmt::Debug for ValidatorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorNode")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl ValidatorNode {
    /// Start a validator node. Fails when no bootstrap record is
    /// configured: a validator with nobody to dial never joins the network.
    pub async fn start(
        identity: &NodeIdentity,
        config: &ValidatorNodeConfig,
        logger: &ScopedLogger,
    ) -> Result<Arc<Self>, NodeError> {
        let name = format!("validator-{}", identity.index());
        if config.bootstrap_record.is_empty() {
            return Err(NodeError::StartFailed(
                name,
                "no bootstrap record configured".to_string(),
            ));
        }
        let logger = logger.child(&name);
        logger.debug(format!(
            "validator node up, dialing {} (batch bounds {:?}..{:?})",
            config.bootstrap_record, config.min_txs_per_block, config.max_txs_per_block
        ));
        Ok(Arc::new(Self {
            name,
            index: identity.index(),
            address: identity.address(),
            state: Mutex::new(NodeState::Running),
            logger,
        }))
    }

    /// Index of the identity this node runs with.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Validator address this node signs for.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether the node process is up.
    pub fn is_running(&self) -> bool {
        *self.state.lock() == NodeState::Running
    }

    /// Stop the node. Fails if it was already stopped.
    pub async fn stop(&self) -> Result<(), NodeError> {
        let mut state = self.state.lock();
        if *state == NodeState::Stopped {
            return Err(NodeError::AlreadyStopped(self.name.clone()));
        }
        *state = NodeState::Stopped;
        self.logger.debug("validator node stopped");
        Ok(())
    }
}
