//! Run reports for backup and restore.
//!
//! Per-node failures never abort a run; they end up here so a partial
//! result can be told apart from a complete one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Store operation that failed on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOperation {
    List,
    Read,
    Write,
    /// A field or entry could not be mapped to or from a flattened key.
    Flatten,
    /// A stored value could not be decoded for a restore.
    Decode,
}

impl fmt::Display for NodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeOperation::List => "list",
            NodeOperation::Read => "read",
            NodeOperation::Write => "write",
            NodeOperation::Flatten => "flatten",
            NodeOperation::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// A failure on a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    /// Offending path or key.
    pub path: String,
    /// What was being done.
    pub operation: NodeOperation,
    /// Underlying cause.
    pub cause: String,
}

impl NodeFailure {
    pub fn new(path: impl Into<String>, operation: NodeOperation, cause: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            operation,
            cause: cause.to_string(),
        }
    }
}

/// A flattened key produced by two different leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeCollision {
    pub key: String,
    /// Leaf whose value was overwritten.
    pub previous_source: String,
    /// Leaf whose value won.
    pub new_source: String,
}

/// Outcome of a backup traversal.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Leaves found and read; absent leaves go to `not_found`.
    pub leaves_read: usize,
    /// Directories listed successfully.
    pub directories_listed: usize,
    /// Keys in the final aggregate.
    pub keys: usize,
    /// Leaves and directories the store reported as absent.
    pub not_found: Vec<String>,
    pub failures: Vec<NodeFailure>,
    pub collisions: Vec<MergeCollision>,
}

impl BackupReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            leaves_read: 0,
            directories_listed: 0,
            keys: 0,
            not_found: Vec::new(),
            failures: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// Whether every node was processed. Collisions and absent nodes do
    /// not make a backup partial.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn finish(&mut self, keys: usize) {
        self.keys = keys;
        self.finished_at = Some(Utc::now());
    }
}

impl Default for BackupReport {
    fn default() -> Self {
        Self::new()
    }
}

/// One bundle written during a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenBundle {
    pub path: String,
    pub fields: usize,
}

/// Outcome of a restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub written: Vec<WrittenBundle>,
    pub failures: Vec<NodeFailure>,
}

impl RestoreReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl Default for RestoreReport {
    fn default() -> Self {
        Self::new()
    }
}
