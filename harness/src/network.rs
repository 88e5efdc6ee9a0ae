//! Top-level network lifecycle controller.
//!
//! [`NetworkHarness`] owns one test network end to end: it allocates a port
//! and starts the bootstrap node, derives every node identity, drives the
//! validator-registration snapshot, starts and stops the validator node
//! processes, and tears the environment down in reverse. One harness, one
//! network, one pass through the phase machine:
//!
//! `Uninitialized -> BootstrapStarted -> KeysDerived -> SnapshotReady ->
//! NodesRunning -> Stopped`

use anyhow::{ensure, Context, Result};
use std::net::TcpListener;
use std::sync::Arc;

use mesa_common::crypto::{Address, Keypair};

use crate::chain::{DevChain, DevChainBuilder, RollupChain};
use crate::config::{HarnessConfig, ValidatorNodeConfig};
use crate::error::ConfigurationError;
use crate::keys::{
    self, derive_node_key, derive_peer_id_key, derive_peer_id_keys, NodeIdentity,
};
use crate::logger::ScopedLogger;
use crate::node::{BootstrapNode, ValidatorNode};
use crate::protocol::ValidatorBootstrapProtocol;
use crate::snapshot::{NetworkContext, SnapshotManager, TeardownReport};

/// Lifecycle phase of a harness instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    BootstrapStarted,
    KeysDerived,
    SnapshotReady,
    NodesRunning,
    Stopped,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::BootstrapStarted => "bootstrap-started",
            Phase::KeysDerived => "keys-derived",
            Phase::SnapshotReady => "snapshot-ready",
            Phase::NodesRunning => "nodes-running",
            Phase::Stopped => "stopped",
        }
    }
}

fn allocate_port(base_port: Option<u16>) -> Result<u16, ConfigurationError> {
    let requested = base_port.unwrap_or(0);
    let listener = TcpListener::bind(("127.0.0.1", requested))
        .map_err(|e| ConfigurationError::PortUnavailable(e.to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|e| ConfigurationError::PortUnavailable(e.to_string()))?
        .port();
    // The listener is only a reservation probe; the node binds afterwards.
    drop(listener);
    Ok(port)
}

/// One multi-node validator network under test.
pub struct NetworkHarness {
    name: String,
    logger: ScopedLogger,
    config: HarnessConfig,
    phase: Phase,
    chain: Arc<DevChain>,
    bootstrap: Arc<BootstrapNode>,
    number_of_nodes: usize,
    node_keys: Vec<Keypair>,
    peer_id_keys: Vec<Keypair>,
    initial_validator: Address,
    snapshots: SnapshotManager,
    nodes: Vec<Arc<ValidatorNode>>,
    context: Option<NetworkContext>,
}

impl std::fmt::Debug for NetworkHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkHarness")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("number_of_nodes", &self.number_of_nodes)
            .field("initial_validator", &self.initial_validator)
            .finish_non_exhaustive()
    }
}

impl NetworkHarness {
    /// Create a harness named after `test_name` with `number_of_nodes`
    /// validators, using configuration from the environment. Allocates a
    /// free port when `base_port` is `None`.
    pub async fn create(
        test_name: &str,
        number_of_nodes: usize,
        base_port: Option<u16>,
    ) -> Result<Self> {
        Self::create_with_config(test_name, number_of_nodes, base_port, HarnessConfig::from_env())
            .await
    }

    /// Like [`create`](Self::create) with explicit configuration.
    pub async fn create_with_config(
        test_name: &str,
        number_of_nodes: usize,
        base_port: Option<u16>,
        config: HarnessConfig,
    ) -> Result<Self> {
        let logger = ScopedLogger::new(format!("e2e_p2p::{test_name}"));

        let port = allocate_port(base_port)?;
        let bootstrap = BootstrapNode::start(port, &derive_peer_id_key(0), &logger).await?;
        logger.debug(format!(
            "phase {} -> {}: bootstrap record {}",
            Phase::Uninitialized.name(),
            Phase::BootstrapStarted.name(),
            bootstrap.record()
        ));

        // Node keys start at index 1; index 0 is the publisher.
        let (node_keys, peer_id_keys) = if number_of_nodes > 0 {
            // Anything that does not fit in the index space fails the range
            // check inside the derivation.
            let count = u32::try_from(number_of_nodes).unwrap_or(u32::MAX);
            (
                keys::derive_node_keys(1, count)?,
                derive_peer_id_keys(count)?,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let publisher = derive_node_key(mesa_common::config::PUBLISHER_KEY_INDEX);
        let initial_validator = Address::from_public_key(&publisher.public());
        logger.debug(format!(
            "phase {}: {} node identities, publisher {}",
            Phase::KeysDerived.name(),
            number_of_nodes,
            initial_validator
        ));

        let chain = Arc::new(
            DevChainBuilder::new()
                .with_slot_duration(config.slot_duration)
                .with_epoch_duration(config.epoch_duration)
                .with_mining_mode(config.mining_mode)
                .with_genesis_validator(initial_validator)
                .build(),
        );
        let context = NetworkContext::new(
            chain.clone() as Arc<dyn RollupChain>,
            ValidatorNodeConfig::new(bootstrap.record()),
        );
        let snapshots = SnapshotManager::new(
            &format!("e2e_p2p/{test_name}"),
            config.data_dir.as_deref(),
            context,
            logger.child("snapshots"),
        )?;

        Ok(Self {
            name: test_name.to_string(),
            logger,
            config,
            phase: Phase::KeysDerived,
            chain,
            bootstrap,
            number_of_nodes,
            node_keys,
            peer_id_keys,
            initial_validator,
            snapshots,
            nodes: Vec::new(),
            context: None,
        })
    }

    fn ensure_phase(&self, expected: Phase) -> Result<(), ConfigurationError> {
        if self.phase != expected {
            return Err(ConfigurationError::PhaseMismatch {
                expected: expected.name(),
                actual: self.phase.name(),
            });
        }
        Ok(())
    }

    /// Name this harness was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The L1 dev chain backing this network.
    pub fn chain(&self) -> &Arc<DevChain> {
        &self.chain
    }

    /// The bootstrap node handle.
    pub fn bootstrap(&self) -> &Arc<BootstrapNode> {
        &self.bootstrap
    }

    /// Address of the designated publisher account, a validator from
    /// genesis.
    pub fn initial_validator(&self) -> Address {
        self.initial_validator
    }

    /// Addresses of the validators this harness registers.
    pub fn validator_addresses(&self) -> Vec<Address> {
        self.node_keys
            .iter()
            .map(|key| Address::from_public_key(&key.public()))
            .collect()
    }

    /// The materialized context, once [`setup`](Self::setup) has run.
    pub fn context(&self) -> Option<&NetworkContext> {
        self.context.as_ref()
    }

    /// Register and apply the validator-registration snapshot: every node
    /// address becomes an active validator as of the next epoch. Cached
    /// across runs with unchanged configuration.
    pub async fn apply_base_snapshots(&mut self) -> Result<()> {
        self.ensure_phase(Phase::KeysDerived)?;

        let protocol = ValidatorBootstrapProtocol::new(
            self.validator_addresses(),
            self.config.receipt_timeout,
            self.logger.child("bootstrap-protocol"),
        );
        self.snapshots
            .snapshot("add-validators", move |ctx| async move {
                protocol.run(ctx).await.map_err(anyhow::Error::from)
            })
            .await?;

        self.phase = Phase::SnapshotReady;
        self.logger.debug(format!("phase {}", self.phase.name()));
        Ok(())
    }

    /// Materialize the snapshot context, apply per-test overrides that must
    /// not live inside cached records, and start every validator node.
    /// Returns the running handles.
    pub async fn setup(&mut self) -> Result<Vec<Arc<ValidatorNode>>> {
        self.ensure_phase(Phase::SnapshotReady)?;

        let mut ctx = self.snapshots.setup().await?;

        // Late overrides: block-production batch bounds are per-test tuning
        // and are fixed only after snapshot restoration.
        ctx.node_config.min_txs_per_block = Some(self.config.min_txs_per_block);
        ctx.node_config.max_txs_per_block = Some(self.config.max_txs_per_block);

        let mut nodes = Vec::with_capacity(self.number_of_nodes);
        for (offset, (signing, peer_id)) in self
            .node_keys
            .iter()
            .zip(self.peer_id_keys.iter())
            .enumerate()
        {
            let identity =
                NodeIdentity::new(offset as u32 + 1, signing.clone(), peer_id.clone());
            let node = ValidatorNode::start(&identity, &ctx.node_config, &self.logger).await?;
            ensure!(
                node.is_running(),
                "validator node {} did not report running",
                node.index()
            );
            nodes.push(node);
        }

        self.logger
            .info(format!("{} validator node(s) running", nodes.len()));
        self.nodes = nodes.clone();
        self.context = Some(ctx);
        self.phase = Phase::NodesRunning;
        Ok(nodes)
    }

    /// Stop every validator node, then the bootstrap node, each stop
    /// awaited before the next. Not reentrant: a second call is a caller
    /// error, not a silent no-op.
    pub async fn stop_nodes(&mut self, nodes: &[Arc<ValidatorNode>]) -> Result<()> {
        self.ensure_phase(Phase::NodesRunning)?;

        self.logger.info("stopping nodes");
        for node in nodes {
            node.stop()
                .await
                .with_context(|| format!("stopping validator node {}", node.index()))?;
        }
        self.bootstrap
            .stop()
            .await
            .context("stopping bootstrap node")?;
        self.logger.info("nodes stopped");

        self.phase = Phase::Stopped;
        Ok(())
    }

    /// Release everything the snapshot steps acquired (reverse order,
    /// best-effort) and report any node process still running as a leak.
    /// Safe to call from any phase.
    pub async fn teardown(&mut self) -> TeardownReport {
        let mut report = self.snapshots.teardown().await;

        for node in &self.nodes {
            if node.is_running() {
                report.push(
                    format!("validator-{}", node.index()),
                    "validator node still running at teardown",
                );
            }
        }
        if self.bootstrap.is_running() {
            report.push("bootstrap", "bootstrap node still running at teardown");
        }

        if report.is_empty() {
            self.logger.debug("teardown clean");
        } else {
            self.logger.warn(format!("{report}"));
        }
        report
    }
}
