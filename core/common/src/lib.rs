//! Common utilities and types shared across kvbackup crates.
//!
//! This module provides the error type, secret values as returned by a
//! store, and the path/key helpers that define how leaf secrets are
//! flattened into a single addressable mapping.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    is_directory, join_path, FlattenedKey, SecretData, SecretValue, SensitiveString, SEPARATOR,
};
