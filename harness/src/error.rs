//! Harness-level error taxonomy.
//!
//! Misuse of the harness API is a [`ConfigurationError`]: always fatal,
//! never retried. Protocol and chain failures carry their own enums next to
//! the code that raises them (`protocol`, `chain`, `node`).

use thiserror::Error;

/// A caller drove the harness outside its contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A snapshot step name was registered twice in one manager.
    #[error("duplicate snapshot step name: '{0}'")]
    DuplicateStep(String),

    /// Key derivation was asked for an empty range, or one that leaves the
    /// key space.
    #[error("invalid key range: start {start}, count {count} (key space ends at {max})")]
    InvalidRange { start: u32, count: u32, max: u32 },

    /// An operation was invoked in the wrong lifecycle phase, e.g. stopping
    /// an already-stopped node set.
    #[error("harness is in phase '{actual}', operation requires '{expected}'")]
    PhaseMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// No port could be bound for the bootstrap node.
    #[error("no port available for the bootstrap node: {0}")]
    PortUnavailable(String),
}
