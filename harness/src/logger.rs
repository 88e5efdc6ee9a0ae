//! Per-harness scoped logging.
//!
//! Every harness instance owns a [`ScopedLogger`] and hands child scopes to
//! the components it builds. Output flows through the `log` facade, so any
//! logger implementation (`env_logger` in tests) picks it up, but each line
//! carries the scope of the harness that emitted it. Running several harness
//! instances in one process keeps their logs distinguishable.

use std::fmt::Display;
use std::sync::Arc;

/// Log target used for all harness output.
pub const LOG_TARGET: &str = "mesa_harness";

/// A logger bound to one harness instance (and optionally a component
/// within it).
#[derive(Clone)]
pub struct ScopedLogger {
    scope: Arc<str>,
}

impl ScopedLogger {
    /// Create a logger with the given scope, e.g. `e2e_p2p::my_test`.
    pub fn new(scope: impl AsRef<str>) -> Self {
        Self {
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// Derive a logger for a component nested under this scope.
    pub fn child(&self, name: &str) -> Self {
        Self {
            scope: Arc::from(format!("{}::{}", self.scope, name).as_str()),
        }
    }

    /// The full scope string.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Log at debug level.
    pub fn debug(&self, message: impl Display) {
        log::debug!(target: LOG_TARGET, "[{}] {}", self.scope, message);
    }

    /// Log at info level.
    pub fn info(&self, message: impl Display) {
        log::info!(target: LOG_TARGET, "[{}] {}", self.scope, message);
    }

    /// Log at warn level.
    pub fn warn(&self, message: impl Display) {
        log::warn!(target: LOG_TARGET, "[{}] {}", self.scope, message);
    }
}
