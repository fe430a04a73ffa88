//! HashiCorp Vault store for kvbackup.
//!
//! This module provides a secret store backed by Vault's KV secrets engine:
//! - Token and namespace headers on every request
//! - KV v1 and v2 path layouts behind one mount
//! - 404 responses mapped to "not found" rather than errors

pub mod client;
pub mod provider;

pub use client::VaultClient;
pub use provider::{create_vault_store, KvVersion, VaultStore, VaultStoreConfig};
