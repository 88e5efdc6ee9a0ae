// File: harness/src/snapshot/manager.rs
//
// SnapshotManager - ordered, cached setup steps with reverse teardown.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::path::Path;

use mesa_common::crypto::Hash;

use crate::chain::RollupChain;
use crate::error::ConfigurationError;
use crate::logger::ScopedLogger;
use crate::snapshot::context::NetworkContext;
use crate::snapshot::store::{SnapshotRecord, SnapshotStore};

type BoxedStep =
    Box<dyn FnOnce(NetworkContext) -> BoxFuture<'static, Result<NetworkContext>> + Send>;
type CleanupFn = Box<dyn FnOnce(NetworkContext) -> BoxFuture<'static, Result<()>> + Send>;

/// Characters of the history hash included in a record key.
const KEY_HASH_LEN: usize = 16;

struct AppliedStep {
    name: String,
    restored: bool,
    cleanup: Option<CleanupFn>,
}

/// One failed resource release, as collected by [`SnapshotManager::teardown`].
#[derive(Debug)]
pub struct TeardownFailure {
    /// Name of the step (or resource) whose release failed.
    pub step: String,
    /// Rendered failure.
    pub error: String,
}

/// Aggregate outcome of a teardown pass.
///
/// Teardown never aborts early: every registered cleanup is attempted and
/// every failure lands here, so one broken resource cannot mask leaks in
/// the others.
#[derive(Debug, Default)]
pub struct TeardownReport {
    failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// True when every release succeeded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The collected failures, in the order they occurred.
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Record a failed release.
    pub fn push(&mut self, step: impl Into<String>, error: impl fmt::Display) {
        self.failures.push(TeardownFailure {
            step: step.into(),
            error: error.to_string(),
        });
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "teardown clean");
        }
        writeln!(f, "{} teardown failure(s):", self.failures.len())?;
        for failure in &self.failures {
            writeln!(f, "  {}: {}", failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// Ordered, cached setup steps over one [`NetworkContext`].
///
/// Steps are applied in registration order; a step whose record exists under
/// the current preceding-configuration hash is restored instead of executed,
/// so a given named step's side effects run at most once per distinct
/// history. A failed step rolls back whatever this run executed and leaves
/// the manager unusable.
pub struct SnapshotManager {
    logger: ScopedLogger,
    store: SnapshotStore,
    context: NetworkContext,
    /// Rolling hash over the base configuration and every registered step
    /// name, in order.
    history: Hash,
    applied: Vec<AppliedStep>,
    finalized: bool,
    poisoned: bool,
}

impl SnapshotManager {
    /// Create a manager for `scope` (e.g. `e2e_p2p/my_test`) over the given
    /// base context. With `data_dir` set, records are persisted under
    /// `data_dir/scope` and reused by later runs.
    pub fn new(
        scope: &str,
        data_dir: Option<&Path>,
        context: NetworkContext,
        logger: ScopedLogger,
    ) -> Result<Self> {
        let store = match data_dir {
            Some(dir) => SnapshotStore::at(dir.join(scope), logger.clone())?,
            None => SnapshotStore::in_memory(logger.clone()),
        };
        let base = serde_json::to_vec(&context.state())
            .context("encoding base context for the history hash")?;
        let history = Hash::digest_parts(&[scope.as_bytes(), &base]);
        Ok(Self {
            logger,
            store,
            context,
            history,
            applied: Vec::new(),
            finalized: false,
            poisoned: false,
        })
    }

    /// The context as of the last applied step.
    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    /// Register `step` under `name` and immediately apply it, or restore its
    /// cached record if one exists for the current history.
    pub async fn snapshot<F, Fut>(&mut self, name: &str, step: F) -> Result<()>
    where
        F: FnOnce(NetworkContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<NetworkContext>> + Send + 'static,
    {
        self.snapshot_inner(name, Box::new(move |ctx| Box::pin(step(ctx))), None)
            .await
    }

    /// Like [`snapshot`](Self::snapshot), additionally registering a cleanup
    /// run by [`teardown`](Self::teardown) (or by rollback when a later step
    /// fails). Restored steps register their cleanup too: restored state
    /// holds the same resources as executed state.
    pub async fn snapshot_with_cleanup<F, Fut, C, CFut>(
        &mut self,
        name: &str,
        step: F,
        cleanup: C,
    ) -> Result<()>
    where
        F: FnOnce(NetworkContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<NetworkContext>> + Send + 'static,
        C: FnOnce(NetworkContext) -> CFut + Send + 'static,
        CFut: Future<Output = Result<()>> + Send + 'static,
    {
        self.snapshot_inner(
            name,
            Box::new(move |ctx| Box::pin(step(ctx))),
            Some(Box::new(move |ctx| Box::pin(cleanup(ctx)))),
        )
        .await
    }

    async fn snapshot_inner(
        &mut self,
        name: &str,
        step: BoxedStep,
        cleanup: Option<CleanupFn>,
    ) -> Result<()> {
        if self.poisoned {
            bail!("snapshot manager is unusable after an earlier step failure");
        }
        if self.finalized {
            bail!("snapshot steps cannot be registered after setup()");
        }
        if self.applied.iter().any(|s| s.name == name) {
            return Err(ConfigurationError::DuplicateStep(name.to_string()).into());
        }

        self.history = Hash::digest_parts(&[self.history.as_bytes(), name.as_bytes()]);
        let key = format!("{}-{}", name, &self.history.to_hex()[..KEY_HASH_LEN]);

        if let Some(record) = self.store.load(&key) {
            match self.context.chain.restore(record.chain).await {
                Ok(()) => {
                    self.context.apply_state(record.context);
                    self.logger.debug(format!("restored snapshot '{name}'"));
                    self.applied.push(AppliedStep {
                        name: name.to_string(),
                        restored: true,
                        cleanup,
                    });
                    return Ok(());
                }
                Err(err) => {
                    // Unusable record: re-run the step instead.
                    self.logger
                        .warn(format!("restore of snapshot '{name}' failed: {err}"));
                }
            }
        }

        self.logger.debug(format!("applying snapshot step '{name}'"));
        match step(self.context.clone()).await {
            Ok(next) => {
                self.context = next;
                match self.context.chain.capture().await {
                    Ok(chain) => self.store.save(SnapshotRecord {
                        step: name.to_string(),
                        key,
                        created_at: Utc::now(),
                        context: self.context.state(),
                        chain,
                    }),
                    Err(err) => self
                        .logger
                        .warn(format!("skipping snapshot capture for '{name}': {err}")),
                }
                self.applied.push(AppliedStep {
                    name: name.to_string(),
                    restored: false,
                    cleanup,
                });
                Ok(())
            }
            Err(err) => {
                self.rollback().await;
                self.poisoned = true;
                Err(err.context(format!("snapshot step '{name}' failed")))
            }
        }
    }

    /// Release the steps executed in this run, in reverse order, keeping
    /// cached (restored) steps registered for a later [`teardown`](Self::teardown).
    async fn rollback(&mut self) {
        let ctx = self.context.clone();
        let mut kept = Vec::new();
        for step in std::mem::take(&mut self.applied).into_iter().rev() {
            if step.restored {
                kept.push(step);
                continue;
            }
            self.logger
                .debug(format!("rolling back snapshot step '{}'", step.name));
            if let Some(cleanup) = step.cleanup {
                if let Err(err) = cleanup(ctx.clone()).await {
                    self.logger
                        .warn(format!("rollback of step '{}' failed: {err:#}", step.name));
                }
            }
        }
        kept.reverse();
        self.applied = kept;
    }

    /// Return the fully materialized context. All registered steps have been
    /// applied or restored by the time this returns.
    pub async fn setup(&mut self) -> Result<NetworkContext> {
        if self.poisoned {
            bail!("snapshot manager is unusable after an earlier step failure");
        }
        if self.finalized {
            bail!("setup() already called on this snapshot manager");
        }
        self.finalized = true;
        self.logger.debug(format!(
            "snapshot context materialized after {} step(s)",
            self.applied.len()
        ));
        Ok(self.context.clone())
    }

    /// Release every applied step's resources in reverse registration
    /// order. Failures are collected, never propagated mid-pass. With zero
    /// applied steps this is a no-op success.
    pub async fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let ctx = self.context.clone();
        let steps = std::mem::take(&mut self.applied);
        if !steps.is_empty() {
            self.logger
                .debug(format!("tearing down {} step(s)", steps.len()));
        }
        for step in steps.into_iter().rev() {
            if let Some(cleanup) = step.cleanup {
                if let Err(err) = cleanup(ctx.clone()).await {
                    self.logger
                        .warn(format!("teardown of step '{}' failed: {err:#}", step.name));
                    report.push(step.name, format!("{err:#}"));
                }
            }
        }
        report
    }
}
