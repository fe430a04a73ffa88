//! Secret store abstraction for kvbackup.
//!
//! This module provides a trait-based interface over hierarchical key-value
//! secret stores (Vault KV, in-memory) and a registry for resolving a
//! store by name and configuration.
//!
//! # Design Principles
//! - Store isolation: no store-specific path layout outside the store
//! - Async operations: every list/read/write is a single request
//! - Not-found is a value (`Ok(None)`), not an error

pub mod memory;
pub mod provider;
pub mod registry;
pub mod vault;

pub use memory::{MemoryStore, Operation};
pub use provider::SecretStore;
pub use registry::{create_default_registry, StoreFactory, StoreRegistry};
pub use vault::{KvVersion, VaultStore, VaultStoreConfig};
