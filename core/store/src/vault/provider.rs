//! Vault KV secrets engine store implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use kvbackup_common::{Error, Result, SecretData, SecretValue, SensitiveString, SEPARATOR};

use crate::provider::SecretStore;

use super::client::VaultClient;

/// KV secrets engine version behind the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvVersion {
    /// Unversioned engine; paths are used as-is.
    #[serde(alias = "1")]
    V1,
    /// Versioned engine; list under `metadata/`, read and write under `data/`.
    #[default]
    #[serde(alias = "2")]
    V2,
}

/// Vault store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultStoreConfig {
    /// Vault server address (e.g., "https://vault.example.com:8200").
    #[serde(default = "default_address")]
    pub address: String,
    /// Client token.
    pub token: SensitiveString,
    /// Enterprise namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// KV engine mount path.
    #[serde(default = "default_mount")]
    pub mount: String,
    /// KV engine version.
    #[serde(default)]
    pub kv_version: KvVersion,
    /// Accept any server certificate.
    #[serde(default)]
    pub tls_skip_verify: bool,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_address() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_mount() -> String {
    "secret".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl VaultStoreConfig {
    /// Create a configuration with defaults for everything but the
    /// address and token.
    pub fn new(address: impl Into<String>, token: SensitiveString) -> Self {
        Self {
            address: address.into(),
            token,
            namespace: None,
            mount: default_mount(),
            kv_version: KvVersion::default(),
            tls_skip_verify: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Secret store backed by a Vault KV mount.
///
/// Namespace paths are relative to the mount. Rewriting into the
/// engine-specific API paths happens here and nowhere else.
pub struct VaultStore {
    client: VaultClient,
    mount: String,
    kv_version: KvVersion,
}

impl VaultStore {
    /// Create a new Vault store.
    ///
    /// # Errors
    /// - Empty token or mount
    /// - Invalid address
    pub fn new(config: VaultStoreConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::Config("Vault token is required".to_string()));
        }

        let mount = config.mount.trim_matches(SEPARATOR).to_string();
        if mount.is_empty() {
            return Err(Error::Config("Vault mount cannot be empty".to_string()));
        }

        let client = VaultClient::new(
            &config.address,
            config.token,
            config.namespace,
            config.tls_skip_verify,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self {
            client,
            mount,
            kv_version: config.kv_version,
        })
    }

    fn list_path(&self, path: &str) -> String {
        match self.kv_version {
            KvVersion::V1 => format!("{}/{}", self.mount, path),
            KvVersion::V2 => format!("{}/metadata/{}", self.mount, path),
        }
    }

    fn data_path(&self, path: &str) -> String {
        match self.kv_version {
            KvVersion::V1 => format!("{}/{}", self.mount, path),
            KvVersion::V2 => format!("{}/data/{}", self.mount, path),
        }
    }

    fn to_secret_data(path: &str, fields: serde_json::Value) -> Result<SecretData> {
        match fields {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(name, value)| (name, SecretValue::from(value)))
                .collect()),
            other => Err(Error::Store(format!(
                "Secret '{}' has non-object data: {}",
                path, other
            ))),
        }
    }
}

#[async_trait]
impl SecretStore for VaultStore {
    fn name(&self) -> &str {
        "vault"
    }

    async fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let api_path = self.list_path(path);
        debug!(path = %api_path, "Listing");
        self.client.list(&api_path).await
    }

    async fn read(&self, path: &str) -> Result<Option<SecretData>> {
        let api_path = self.data_path(path);
        debug!(path = %api_path, "Reading");

        let Some(data) = self.client.read(&api_path).await? else {
            return Ok(None);
        };

        let fields = match self.kv_version {
            KvVersion::V1 => data,
            // A deleted or destroyed latest version reads back as `data: null`.
            KvVersion::V2 => match data.get("data") {
                Some(serde_json::Value::Null) | None => return Ok(None),
                Some(inner) => inner.clone(),
            },
        };

        Self::to_secret_data(path, fields).map(Some)
    }

    async fn write(&self, path: &str, data: &SecretData) -> Result<()> {
        let api_path = self.data_path(path);
        debug!(path = %api_path, fields = data.len(), "Writing");

        let fields: serde_json::Map<String, serde_json::Value> = data
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();

        let body = match self.kv_version {
            KvVersion::V1 => serde_json::Value::Object(fields),
            KvVersion::V2 => serde_json::json!({ "data": fields }),
        };

        self.client.write(&api_path, &body).await
    }
}

/// Create a Vault store from JSON configuration.
pub fn create_vault_store(config: serde_json::Value) -> Result<Arc<dyn SecretStore>> {
    let vault_config: VaultStoreConfig = serde_json::from_value(config)
        .map_err(|e| Error::Config(format!("Invalid Vault config: {}", e)))?;

    Ok(Arc::new(VaultStore::new(vault_config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer, kv_version: KvVersion) -> VaultStore {
        let mut config = VaultStoreConfig::new(server.uri(), SensitiveString::new("s.test"));
        config.kv_version = kv_version;
        VaultStore::new(config).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config: VaultStoreConfig =
            serde_json::from_value(serde_json::json!({ "token": "s.abc" })).unwrap();

        assert_eq!(config.address, "http://127.0.0.1:8200");
        assert_eq!(config.mount, "secret");
        assert_eq!(config.kv_version, KvVersion::V2);
        assert!(!config.tls_skip_verify);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_kv_version_alias() {
        let config: VaultStoreConfig =
            serde_json::from_value(serde_json::json!({ "token": "s.abc", "kv_version": "1" }))
                .unwrap();
        assert_eq!(config.kv_version, KvVersion::V1);
    }

    #[test]
    fn test_empty_token_rejected() {
        let config = VaultStoreConfig::new("http://127.0.0.1:8200", SensitiveString::new(""));
        assert!(matches!(VaultStore::new(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_list_v2_uses_metadata_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/app/"))
            .and(query_param("list", "true"))
            .and(header("X-Vault-Token", "s.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "keys": ["db", "nested/"] }
            })))
            .mount(&server)
            .await;

        let names = store(&server, KvVersion::V2).list("app/").await.unwrap();
        assert_eq!(names, Some(vec!["db".to_string(), "nested/".to_string()]));
    }

    #[tokio::test]
    async fn test_list_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/missing/"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": []
            })))
            .mount(&server)
            .await;

        let names = store(&server, KvVersion::V2).list("missing/").await.unwrap();
        assert_eq!(names, None);
    }

    #[tokio::test]
    async fn test_read_v2_unwraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/app/db"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "data": { "user": "admin", "port": 5432, "tls": true },
                    "metadata": { "version": 3 }
                }
            })))
            .mount(&server)
            .await;

        let data = store(&server, KvVersion::V2)
            .read("app/db")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data["user"], SecretValue::String("admin".to_string()));
        assert_eq!(data["port"].to_plain_string(), "5432");
        assert_eq!(data["tls"], SecretValue::Bool(true));
    }

    #[tokio::test]
    async fn test_read_v2_deleted_version_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/app/old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "data": null, "metadata": { "deletion_time": "2024-01-01T00:00:00Z" } }
            })))
            .mount(&server)
            .await;

        let data = store(&server, KvVersion::V2).read("app/old").await.unwrap();
        assert_eq!(data, None);
    }

    #[tokio::test]
    async fn test_read_v1_uses_plain_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/app/db"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "user": "admin" }
            })))
            .mount(&server)
            .await;

        let data = store(&server, KvVersion::V1)
            .read("app/db")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data["user"], SecretValue::String("admin".to_string()));
    }

    #[tokio::test]
    async fn test_read_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/locked"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "errors": ["permission denied"]
            })))
            .mount(&server)
            .await;

        let err = store(&server, KvVersion::V2).read("locked").await.unwrap_err();
        match err {
            Error::Store(message) => assert!(message.contains("permission denied")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_v2_wraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/p/q"))
            .and(body_json(serde_json::json!({ "data": { "x": "1", "y": "2" } })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut data = SecretData::new();
        data.insert("x".to_string(), SecretValue::from("1"));
        data.insert("y".to_string(), SecretValue::from("2"));

        store(&server, KvVersion::V2).write("p/q", &data).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_v1_sends_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/p/q"))
            .and(body_json(serde_json::json!({ "x": "1" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut data = SecretData::new();
        data.insert("x".to_string(), SecretValue::from("1"));

        store(&server, KvVersion::V1).write("p/q", &data).await.unwrap();
    }

    #[tokio::test]
    async fn test_namespace_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/a"))
            .and(header("X-Vault-Namespace", "team-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "data": { "k": "v" } }
            })))
            .mount(&server)
            .await;

        let mut config = VaultStoreConfig::new(server.uri(), SensitiveString::new("s.test"));
        config.namespace = Some("team-a".to_string());
        let store = VaultStore::new(config).unwrap();

        assert!(store.read("a").await.unwrap().is_some());
    }
}
