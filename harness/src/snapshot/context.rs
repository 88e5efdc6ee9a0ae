//! The shared state threaded through snapshot steps.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use mesa_common::crypto::Address;

use crate::chain::RollupChain;
use crate::config::ValidatorNodeConfig;

/// Everything a setup step can see and extend.
///
/// Exactly one context exists per harness instance. Steps never mutate it in
/// place: each step receives the current version and returns the next one,
/// which keeps the cache-or-restore logic a plain value swap.
#[derive(Clone)]
pub struct NetworkContext {
    /// Handle to the L1 chain every step operates against.
    pub chain: Arc<dyn RollupChain>,
    /// Configuration for validator nodes, extended by steps.
    pub node_config: ValidatorNodeConfig,
    /// Validator addresses registered by the steps applied so far.
    pub validators: Vec<Address>,
}

/// The serializable part of a context, as captured into snapshot records.
/// The chain handle itself is not serializable; its ledger is captured
/// separately through [`RollupChain::capture`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ContextState {
    pub node_config: ValidatorNodeConfig,
    pub validators: Vec<Address>,
}

impl std::fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContext")
            .field("node_config", &self.node_config)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

impl NetworkContext {
    /// Create the base context the first step starts from.
    pub fn new(chain: Arc<dyn RollupChain>, node_config: ValidatorNodeConfig) -> Self {
        Self {
            chain,
            node_config,
            validators: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> ContextState {
        ContextState {
            node_config: self.node_config.clone(),
            validators: self.validators.clone(),
        }
    }

    pub(crate) fn apply_state(&mut self, state: ContextState) {
        self.node_config = state.node_config;
        self.validators = state.validators;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::DevChainBuilder;

    #[test]
    fn test_state_round_trip() {
        let chain = Arc::new(DevChainBuilder::new().build());
        let mut ctx = NetworkContext::new(chain.clone(), ValidatorNodeConfig::new("enr:-a"));
        ctx.validators.push(Address::zero());

        let json = serde_json::to_string(&ctx.state()).unwrap();
        let state: ContextState = serde_json::from_str(&json).unwrap();

        let mut other = NetworkContext::new(chain, ValidatorNodeConfig::new("enr:-b"));
        other.apply_state(state);
        assert_eq!(other.node_config.bootstrap_record, "enr:-a");
        assert_eq!(other.validators, vec![Address::zero()]);
    }
}
