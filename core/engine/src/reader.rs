//! Leaf secret reader and flattener.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use kvbackup_common::{FlattenedKey, Result};
use kvbackup_store::SecretStore;

use crate::encoder::ValueEncoding;

/// Whether a leaf held a secret when it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafStatus {
    Found,
    /// No secret or no live version at the path.
    NotFound,
}

/// Flattened fields of one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSecrets {
    /// Leaf path the entries were read from.
    pub source: String,
    pub status: LeafStatus,
    /// Flattened key to encoded value.
    pub entries: BTreeMap<String, String>,
    /// Fields that cannot be flattened, with the reason.
    pub rejected: Vec<(String, String)>,
}

impl LeafSecrets {
    fn not_found(source: &str) -> Self {
        Self {
            source: source.to_string(),
            status: LeafStatus::NotFound,
            entries: BTreeMap::new(),
            rejected: Vec::new(),
        }
    }
}

/// Reads single leaves and flattens their fields into
/// `<leaf-path>/<field-name>` keys.
pub struct SecretReader<'a> {
    store: &'a dyn SecretStore,
    encoding: ValueEncoding,
}

impl<'a> SecretReader<'a> {
    pub fn new(store: &'a dyn SecretStore, encoding: ValueEncoding) -> Self {
        Self { store, encoding }
    }

    /// Read one leaf and flatten it.
    ///
    /// An absent secret yields an empty result with
    /// [`LeafStatus::NotFound`], not an error. Fields whose name cannot
    /// form a unique key (empty, or containing `/`) are left out and listed
    /// in `rejected`; the remaining fields are still returned.
    ///
    /// # Errors
    /// - The store read itself failed
    pub async fn read_leaf(&self, path: &str) -> Result<LeafSecrets> {
        debug!(path = %path, "Reading leaf");

        let Some(data) = self.store.read(path).await? else {
            warn!(path = %path, "No secret or version found");
            return Ok(LeafSecrets::not_found(path));
        };

        let mut leaf = LeafSecrets {
            source: path.to_string(),
            status: LeafStatus::Found,
            entries: BTreeMap::new(),
            rejected: Vec::new(),
        };

        for (field, value) in &data {
            match FlattenedKey::new(path, field.as_str()) {
                Ok(key) => {
                    leaf.entries
                        .insert(key.to_key_string(), self.encoding.encode(value));
                }
                Err(err) => {
                    warn!(path = %path, field = %field, error = %err, "Skipping field");
                    leaf.rejected.push((field.clone(), err.to_string()));
                }
            }
        }

        Ok(leaf)
    }
}
