//! Backup and restore engine for hierarchical secret stores.
//!
//! This module provides:
//! - Depth-first enumeration of a secret namespace
//! - Flattening of leaf fields into `<leaf-path>/<field>` keys
//! - A single-writer aggregate with last-write-wins merging
//! - JSON, YAML and `key = value` artifact formats
//! - Regrouping of flattened keys into per-path bundles for restore
//!
//! # Architecture
//! The engine sits between the CLI and a [`SecretStore`](kvbackup_store::SecretStore).
//! Every store call is awaited one at a time; per-node failures are
//! collected in a report instead of aborting the run.

pub mod aggregate;
pub mod config;
pub mod encoder;
pub mod format;
pub mod operations;
pub mod reader;
pub mod report;
pub mod restore;
pub mod walker;

pub use aggregate::{Aggregate, AggregateMap};
pub use config::{parse_roots, BackupConfig, RestoreConfig, DEFAULT_FILENAME};
pub use encoder::ValueEncoding;
pub use format::OutputFormat;
pub use operations::{collect_secrets, run_backup, run_restore};
pub use reader::{LeafSecrets, LeafStatus, SecretReader};
pub use report::{BackupReport, MergeCollision, NodeFailure, NodeOperation, RestoreReport, WrittenBundle};
pub use restore::{group_entries, GroupingStrategy, Grouping, RestoreGrouper, SecretBundle};
pub use walker::PathEnumerator;
