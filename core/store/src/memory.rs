//! In-memory secret store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kvbackup_common::{is_directory, Error, Result, SecretData, SEPARATOR};

use crate::provider::SecretStore;

/// Store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Read,
    Write,
}

#[derive(Default)]
struct State {
    leaves: BTreeMap<String, SecretData>,
    /// Listings that override what is derived from `leaves`.
    listings: BTreeMap<String, Vec<String>>,
    failures: HashSet<(Operation, String)>,
    writes: Vec<(String, SecretData)>,
}

/// In-memory secret store.
///
/// Useful for testing and dry runs. Directory listings are derived from
/// the stored leaf paths. Failures can be injected per path and
/// operation, and every successful write is recorded in order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with leaf secrets.
    pub fn with_secrets(secrets: impl IntoIterator<Item = (String, SecretData)>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            state.leaves.extend(secrets);
        }
        store
    }

    fn state(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::Store("Memory store lock poisoned".to_string()))
    }

    fn state_mut(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::Store("Memory store lock poisoned".to_string()))
    }

    /// Insert or replace a leaf secret without recording a write.
    pub fn insert(&self, path: impl Into<String>, data: SecretData) -> Result<()> {
        let path = path.into();
        if is_directory(&path) {
            return Err(Error::InvalidInput(format!("'{}' is not a leaf path", path)));
        }
        self.state_mut()?.leaves.insert(path, data);
        Ok(())
    }

    /// Override the listing returned for a directory.
    ///
    /// Lets tests control child order or list names with no backing leaf.
    pub fn set_listing(&self, path: impl Into<String>, names: Vec<String>) -> Result<()> {
        self.state_mut()?.listings.insert(path.into(), names);
        Ok(())
    }

    /// Make every `operation` on `path` fail with a store error.
    pub fn fail_on(&self, operation: Operation, path: impl Into<String>) -> Result<()> {
        self.state_mut()?.failures.insert((operation, path.into()));
        Ok(())
    }

    /// Get a leaf secret.
    pub fn get(&self, path: &str) -> Result<Option<SecretData>> {
        Ok(self.state()?.leaves.get(path).cloned())
    }

    /// All successful writes, in the order they were issued.
    pub fn writes(&self) -> Result<Vec<(String, SecretData)>> {
        Ok(self.state()?.writes.clone())
    }

    fn check_failure(state: &State, operation: Operation, path: &str) -> Result<()> {
        if state.failures.contains(&(operation, path.to_string())) {
            return Err(Error::Store(format!(
                "Injected {:?} failure at '{}'",
                operation, path
            )));
        }
        Ok(())
    }

    fn derive_listing(leaves: &BTreeMap<String, SecretData>, prefix: &str) -> Vec<String> {
        let mut children = BTreeSet::new();
        for key in leaves.keys() {
            let Some(relative) = key.strip_prefix(prefix) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }
            match relative.split_once(SEPARATOR) {
                Some((dir, _)) => children.insert(format!("{}{}", dir, SEPARATOR)),
                None => children.insert(relative.to_string()),
            };
        }
        children.into_iter().collect()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let state = self.state()?;
        Self::check_failure(&state, Operation::List, path)?;

        if !is_directory(path) {
            return Err(Error::InvalidInput(format!("'{}' is not a directory", path)));
        }

        if let Some(names) = state.listings.get(path) {
            return Ok(Some(names.clone()));
        }

        let children = Self::derive_listing(&state.leaves, path);
        if children.is_empty() {
            Ok(None)
        } else {
            Ok(Some(children))
        }
    }

    async fn read(&self, path: &str) -> Result<Option<SecretData>> {
        let state = self.state()?;
        Self::check_failure(&state, Operation::Read, path)?;

        if is_directory(path) {
            return Err(Error::InvalidInput(format!("'{}' is not a leaf path", path)));
        }

        Ok(state.leaves.get(path).cloned())
    }

    async fn write(&self, path: &str, data: &SecretData) -> Result<()> {
        let mut state = self.state_mut()?;
        Self::check_failure(&state, Operation::Write, path)?;

        if is_directory(path) {
            return Err(Error::InvalidInput(format!("'{}' is not a leaf path", path)));
        }

        state.leaves.insert(path.to_string(), data.clone());
        state.writes.push((path.to_string(), data.clone()));
        Ok(())
    }
}
