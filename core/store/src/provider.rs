//! Secret store trait definition.

use async_trait::async_trait;

use kvbackup_common::{Result, SecretData};

/// Client for a hierarchical key-value secret store.
///
/// Paths are relative to the store's mount. A path ending in `/` is a
/// directory and can be listed; any other path is a leaf and can be read
/// or written. The namespace is assumed to be a strict tree: a listing
/// never refers back to one of its ancestors.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get the store name (e.g., "vault", "memory").
    fn name(&self) -> &str;

    /// List the children of a directory.
    ///
    /// Child directories end with `/`, leaves do not. Order is whatever the
    /// store returns and must not be relied upon.
    ///
    /// # Returns
    /// - `Ok(Some(names))` for an existing directory
    /// - `Ok(None)` if nothing exists under the path
    ///
    /// # Errors
    /// - Network/I/O errors
    /// - Store rejected the request (e.g., permission denied)
    async fn list(&self, path: &str) -> Result<Option<Vec<String>>>;

    /// Read the fields of a leaf secret.
    ///
    /// # Returns
    /// - `Ok(Some(data))` if the secret exists
    /// - `Ok(None)` if no secret or no live version exists
    ///
    /// # Errors
    /// - Network/I/O errors
    /// - Store rejected the request
    async fn read(&self, path: &str) -> Result<Option<SecretData>>;

    /// Write all fields of a leaf secret in one request.
    ///
    /// # Postconditions
    /// - The secret at `path` holds exactly `data`
    ///
    /// # Errors
    /// - Network/I/O errors
    /// - Store rejected the request
    async fn write(&self, path: &str, data: &SecretData) -> Result<()>;
}
