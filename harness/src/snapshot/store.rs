//! Persistence for snapshot records.
//!
//! Records are keyed by step name plus the hash of everything that preceded
//! the step; a stale key simply never matches, so invalidation needs no
//! bookkeeping. With a data directory configured, records are additionally
//! written as JSON files so a later process can skip the same steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::chain::ChainSnapshot;
use crate::logger::ScopedLogger;
use crate::snapshot::context::ContextState;

/// A persisted capture of the environment after one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Name of the step that produced this record.
    pub step: String,
    /// Step name plus preceding-configuration hash.
    pub key: String,
    /// When the record was captured.
    pub created_at: DateTime<Utc>,
    /// Serializable context state after the step.
    pub(crate) context: ContextState,
    /// Chain ledger after the step.
    pub(crate) chain: ChainSnapshot,
}

/// Record storage: always in memory, optionally mirrored to disk.
pub struct SnapshotStore {
    dir: Option<PathBuf>,
    memory: HashMap<String, SnapshotRecord>,
    logger: ScopedLogger,
}

impl SnapshotStore {
    /// A store that lives and dies with the process.
    pub fn in_memory(logger: ScopedLogger) -> Self {
        Self {
            dir: None,
            memory: HashMap::new(),
            logger,
        }
    }

    /// A store mirrored to `dir`, created if missing.
    pub fn at(dir: PathBuf, logger: ScopedLogger) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating snapshot directory {}", dir.display()))?;
        Ok(Self {
            dir: Some(dir),
            memory: HashMap::new(),
            logger,
        })
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{key}.json")))
    }

    /// Look up a record. A record that exists but fails to parse is
    /// discarded (the step re-runs), not surfaced as an error.
    pub fn load(&self, key: &str) -> Option<SnapshotRecord> {
        if let Some(record) = self.memory.get(key) {
            return Some(record.clone());
        }
        let path = self.path_for(key)?;
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                self.logger.warn(format!(
                    "discarding unreadable snapshot record {}: {err}",
                    path.display()
                ));
                None
            }
        }
    }

    /// Insert a record, mirroring it to disk when a directory is set.
    /// Disk failures degrade to warnings: caching is an optimization, never
    /// a correctness requirement.
    pub fn save(&mut self, record: SnapshotRecord) {
        if let Some(path) = self.path_for(&record.key) {
            match serde_json::to_string_pretty(&record) {
                Ok(json) => {
                    if let Err(err) = fs::write(&path, json) {
                        self.logger.warn(format!(
                            "failed to persist snapshot record {}: {err}",
                            path.display()
                        ));
                    }
                }
                Err(err) => {
                    self.logger
                        .warn(format!("failed to encode snapshot record: {err}"));
                }
            }
        }
        self.memory.insert(record.key.clone(), record);
    }
}
