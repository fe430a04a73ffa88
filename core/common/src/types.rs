//! Common types used throughout kvbackup.

use serde::Deserialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

/// Separator between namespace path components.
pub const SEPARATOR: char = '/';

/// Fields of one leaf secret, keyed by field name.
pub type SecretData = BTreeMap<String, SecretValue>;

/// Check whether a namespace path denotes a directory.
///
/// The empty path is the namespace root and therefore a directory.
pub fn is_directory(path: &str) -> bool {
    path.is_empty() || path.ends_with(SEPARATOR)
}

/// Append a child name returned by a listing to its parent path.
///
/// The parent is either empty (namespace root) or a directory path that
/// already ends with the separator, so this is plain concatenation.
pub fn join_path(parent: &str, name: &str) -> String {
    let mut path = String::with_capacity(parent.len() + name.len());
    path.push_str(parent);
    path.push_str(name);
    path
}

/// A single field value as returned by the secret store.
///
/// Stores are schemaless; values are narrowed into this closed set at the
/// store boundary and only stringified by a value encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl SecretValue {
    /// Render the value as text, the way it would be printed.
    ///
    /// Byte values that are not valid UTF-8 are converted lossily.
    pub fn to_plain_string(&self) -> String {
        match self {
            SecretValue::String(s) => s.clone(),
            SecretValue::Number(n) => n.to_string(),
            SecretValue::Bool(b) => b.to_string(),
            SecretValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Raw bytes of the value. Non-byte values use their text form.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            SecretValue::String(s) => Cow::Borrowed(s.as_bytes()),
            SecretValue::Bytes(bytes) => Cow::Borrowed(bytes.as_slice()),
            other => Cow::Owned(other.to_plain_string().into_bytes()),
        }
    }

    /// Convert to a JSON value for a store write.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SecretValue::String(s) => serde_json::Value::String(s.clone()),
            SecretValue::Number(n) => serde_json::Value::Number(n.clone()),
            SecretValue::Bool(b) => serde_json::Value::Bool(*b),
            SecretValue::Bytes(_) => serde_json::Value::String(self.to_plain_string()),
        }
    }
}

impl From<serde_json::Value> for SecretValue {
    /// Narrow an arbitrary JSON value.
    ///
    /// `null` becomes an empty string; arrays and objects keep their
    /// compact JSON text.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => SecretValue::String(s),
            serde_json::Value::Number(n) => SecretValue::Number(n),
            serde_json::Value::Bool(b) => SecretValue::Bool(b),
            serde_json::Value::Null => SecretValue::String(String::new()),
            nested => SecretValue::String(nested.to_string()),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        SecretValue::String(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue::String(value)
    }
}

/// A fully-qualified key `<leaf-path>/<field-name>` in the aggregate mapping.
///
/// The owner path never ends with the separator and the field name never
/// contains it, so splitting at the last separator recovers both halves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlattenedKey {
    owner: String,
    field: String,
}

impl FlattenedKey {
    /// Build a key from a leaf path and one of its field names.
    ///
    /// # Errors
    /// - Leaf path is empty or denotes a directory
    /// - Field name is empty or contains the separator
    pub fn new(owner: impl Into<String>, field: impl Into<String>) -> crate::Result<Self> {
        let owner = owner.into();
        let field = field.into();

        if is_directory(&owner) {
            return Err(crate::Error::InvalidInput(format!(
                "'{}' is not a leaf path",
                owner
            )));
        }
        if field.is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "Empty field name under '{}'",
                owner
            )));
        }
        if field.contains(SEPARATOR) {
            return Err(crate::Error::InvalidInput(format!(
                "Field name '{}' under '{}' contains a path separator",
                field, owner
            )));
        }

        Ok(Self { owner, field })
    }

    /// Split a flattened key at its last separator.
    ///
    /// # Errors
    /// - Key has no separator, or either half is empty
    pub fn parse(key: &str) -> crate::Result<Self> {
        let (owner, field) = key.rsplit_once(SEPARATOR).ok_or_else(|| {
            crate::Error::InvalidInput(format!("Key '{}' has no owner path", key))
        })?;

        if owner.is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "Key '{}' has an empty owner path",
                key
            )));
        }

        Self::new(owner, field)
    }

    /// Path of the leaf that owns this field.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Field name within the owning leaf.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Convert to the string form used in the aggregate and artifacts.
    pub fn to_key_string(&self) -> String {
        format!("{}{}{}", self.owner, SEPARATOR, self.field)
    }
}

impl fmt::Display for FlattenedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, SEPARATOR, self.field)
    }
}

/// String wrapper for credentials that zeroizes on drop.
#[derive(Clone, Zeroize, Deserialize)]
#[serde(transparent)]
#[zeroize(drop)]
pub struct SensitiveString(String);

impl SensitiveString {
    /// Wrap a credential.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString([REDACTED])")
    }
}
