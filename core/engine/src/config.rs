//! Run configuration for backup and restore.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use kvbackup_common::{Error, Result};

use crate::encoder::ValueEncoding;
use crate::format::OutputFormat;
use crate::restore::GroupingStrategy;

/// Default artifact filename.
pub const DEFAULT_FILENAME: &str = "vault.backup";

/// Split a comma-separated list of root prefixes.
///
/// Whitespace around each entry is dropped. An empty entry is kept: it is
/// the namespace root.
pub fn parse_roots(roots: &str) -> Vec<String> {
    roots.split(',').map(|root| root.trim().to_string()).collect()
}

/// Configuration of one backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root prefixes to walk, relative to the store mount.
    pub roots: Vec<String>,
    /// Artifact format.
    #[serde(default)]
    pub format: OutputFormat,
    /// Value encoding for every field.
    #[serde(default)]
    pub encoding: ValueEncoding,
    /// Artifact path.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_FILENAME)
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            roots: vec![String::new()],
            format: OutputFormat::default(),
            encoding: ValueEncoding::default(),
            output: default_output(),
        }
    }
}

impl BackupConfig {
    /// Check the configuration before any store or file access.
    ///
    /// # Errors
    /// - No root prefixes
    pub fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(Error::Config("At least one root prefix is required".to_string()));
        }
        Ok(())
    }
}

/// Configuration of one restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Artifact path.
    #[serde(default = "default_output")]
    pub input: PathBuf,
    /// Artifact format.
    #[serde(default)]
    pub format: OutputFormat,
    /// Encoding the artifact values were written with.
    #[serde(default)]
    pub encoding: ValueEncoding,
    /// Bundle grouping strategy.
    #[serde(default)]
    pub strategy: GroupingStrategy,
    /// Prepended to every owner path before writing.
    #[serde(default)]
    pub prefix: String,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            input: default_output(),
            format: OutputFormat::default(),
            encoding: ValueEncoding::default(),
            strategy: GroupingStrategy::default(),
            prefix: String::new(),
        }
    }
}

impl RestoreConfig {
    /// Check the configuration before any store or file access.
    ///
    /// # Errors
    /// - Format has no reader (`kv`)
    pub fn validate(&self) -> Result<()> {
        if !self.format.is_readable() {
            return Err(Error::Format(format!(
                "Cannot restore from '{}' artifacts",
                self.format
            )));
        }
        Ok(())
    }
}
