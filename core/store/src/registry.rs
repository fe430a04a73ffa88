//! Store registry for dynamic store resolution.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use kvbackup_common::{Error, Result, SecretData, SecretValue};

use crate::memory::MemoryStore;
use crate::provider::SecretStore;

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn SecretStore>> + Send + Sync>;

/// Registry for secret store factories.
///
/// Allows registration and resolution of stores by name and
/// configuration.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::Config(format!(
                "Store '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by name and configuration.
    ///
    /// # Errors
    /// - Store not registered
    /// - Configuration invalid for the store
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn SecretStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::Config(format!("Store '{}' is not registered", name)))?;
        factory(config)
    }

    /// Get list of registered store names.
    pub fn stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store is registered.
    pub fn has_store(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a memory store from `{"secrets": {"<path>": {"<field>": <value>}}}`.
fn create_memory_store(config: Value) -> Result<Arc<dyn SecretStore>> {
    let store = MemoryStore::new();

    let Some(secrets) = config.get("secrets") else {
        return Ok(Arc::new(store));
    };

    let secrets = secrets
        .as_object()
        .ok_or_else(|| Error::Config("Memory store 'secrets' must be an object".to_string()))?;

    for (path, fields) in secrets {
        let fields = fields.as_object().ok_or_else(|| {
            Error::Config(format!("Memory store secret '{}' must be an object", path))
        })?;
        let data: SecretData = fields
            .iter()
            .map(|(name, value)| (name.clone(), SecretValue::from(value.clone())))
            .collect();
        store.insert(path.clone(), data)?;
    }

    Ok(Arc::new(store))
}

/// Create a registry with the built-in stores.
pub fn create_default_registry() -> StoreRegistry {
    let mut registry = StoreRegistry::new();

    registry
        .factories
        .insert("memory".to_string(), Box::new(create_memory_store));

    registry.factories.insert(
        "vault".to_string(),
        Box::new(crate::vault::create_vault_store),
    );

    registry
}
