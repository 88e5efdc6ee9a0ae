//! Validator committee bootstrap against the rollup contract.
//!
//! Takes a committee from "addresses known off-chain" to "active for
//! consensus" as of the next epoch, inside a single snapshot step:
//! sequential registration (one confirmed transaction per validator, so
//! nonces stay ordered and logs stay readable), a time-warp to the first
//! slot of the next epoch, and one settlement transaction that forces a
//! block so the warp becomes observable.

use thiserror::Error;
use tokio::time::Duration;

use mesa_common::crypto::Address;

use crate::chain::{ChainError, RollupChain, TxHash, WarpError};
use crate::logger::ScopedLogger;
use crate::snapshot::NetworkContext;

/// Failures of one protocol run. All are fatal to the current setup call;
/// none corrupt already-committed on-chain state, so a fresh harness can
/// retry from scratch.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A validator registration reverted or failed to confirm.
    #[error("registration of validator {address} failed: {source}")]
    RegistrationFailed {
        address: Address,
        #[source]
        source: ChainError,
    },

    /// Computing or advancing to the target epoch timestamp failed for a
    /// reason other than the chain having already reached it.
    #[error("advancing chain time failed: {0}")]
    TimeAdvanceFailed(String),

    /// The settling transaction was not mined within the configured wait.
    /// Distinct from the other two so callers can tell "protocol logic
    /// broken" from "chain too slow".
    #[error("settlement {tx} not confirmed within {waited:?}")]
    ConfirmationTimeout { tx: TxHash, waited: Duration },
}

impl ProtocolError {
    fn time_advance(err: impl std::fmt::Display) -> Self {
        Self::TimeAdvanceFailed(err.to_string())
    }
}

/// One run of the registration-and-epoch-advance sequence.
pub struct ValidatorBootstrapProtocol {
    validators: Vec<Address>,
    receipt_timeout: Duration,
    logger: ScopedLogger,
}

impl ValidatorBootstrapProtocol {
    /// Prepare a run registering `validators`, waiting at most
    /// `receipt_timeout` for each confirmation.
    pub fn new(
        validators: Vec<Address>,
        receipt_timeout: Duration,
        logger: ScopedLogger,
    ) -> Self {
        Self {
            validators,
            receipt_timeout,
            logger,
        }
    }

    /// Execute the protocol over `ctx`, returning the context with the
    /// registered addresses recorded. On success, subsequent
    /// `active_validators` reads observe the new committee.
    pub async fn run(&self, mut ctx: NetworkContext) -> Result<NetworkContext, ProtocolError> {
        for address in &self.validators {
            let tx = ctx.chain.add_validator(*address).await.map_err(|source| {
                ProtocolError::RegistrationFailed {
                    address: *address,
                    source,
                }
            })?;
            ctx.chain
                .wait_for_receipt(tx, self.receipt_timeout)
                .await
                .map_err(|source| ProtocolError::RegistrationFailed {
                    address: *address,
                    source,
                })?;
            self.logger.debug(format!("added {address} as validator"));
        }

        // The committee is picked at epoch boundaries, so jump to the first
        // slot of the next epoch.
        let slots_in_epoch = ctx
            .chain
            .epoch_duration()
            .await
            .map_err(ProtocolError::time_advance)?;
        let target = ctx
            .chain
            .timestamp_for_slot(slots_in_epoch)
            .await
            .map_err(ProtocolError::time_advance)?;

        match ctx.chain.warp(target).await {
            Ok(()) => self.logger.debug(format!("warped chain time to {target}")),
            Err(WarpError::AlreadyPastTarget { current, target }) => {
                // Benign under interval mining: the chain got there on its
                // own while registrations were confirming.
                self.logger.debug(format!(
                    "warp skipped, chain time {current} already past target {target}"
                ));
            }
            Err(err) => return Err(ProtocolError::time_advance(err)),
        }

        // Some backends only reveal a new timestamp once another block is
        // mined, so settle with one confirmed transaction.
        let tx = ctx
            .chain
            .send_settlement()
            .await
            .map_err(ProtocolError::time_advance)?;
        match ctx.chain.wait_for_receipt(tx, self.receipt_timeout).await {
            Ok(()) => {}
            Err(ChainError::ReceiptTimeout { tx, waited }) => {
                return Err(ProtocolError::ConfirmationTimeout { tx, waited });
            }
            Err(err) => return Err(ProtocolError::time_advance(err)),
        }

        ctx.validators.extend(self.validators.iter().copied());
        Ok(ctx)
    }
}
