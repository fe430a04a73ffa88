//! Vault HTTP API client.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use kvbackup_common::{Error, Result, SensitiveString, SEPARATOR};

/// Header carrying the client token.
const TOKEN_HEADER: &str = "X-Vault-Token";
/// Header selecting an Enterprise namespace.
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Response envelope shared by Vault's logical endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// `data` body of a list response.
#[derive(Debug, Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Vec<String>,
}

/// Error body returned by Vault on failure.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Low-level Vault client.
///
/// Speaks to `/v1/<api-path>` endpoints and knows nothing about secrets
/// engines; callers build the API path.
pub struct VaultClient {
    http: Client,
    address: Url,
    token: SensitiveString,
    namespace: Option<String>,
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    /// - Address is not a valid URL
    /// - HTTP client could not be built
    pub fn new(
        address: &str,
        token: SensitiveString,
        namespace: Option<String>,
        tls_skip_verify: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let address = Url::parse(address)
            .map_err(|e| Error::Config(format!("Invalid Vault address '{}': {}", address, e)))?;

        let http = Client::builder()
            .user_agent("kvbackup/0.1")
            .timeout(timeout)
            .danger_accept_invalid_certs(tls_skip_verify)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            address,
            token,
            namespace,
        })
    }

    /// Build the URL for an API path such as `secret/metadata/app/`.
    ///
    /// Each segment is escaped separately so a trailing separator survives.
    fn endpoint(&self, api_path: &str) -> Result<Url> {
        let encoded: Vec<String> = api_path
            .split(SEPARATOR)
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();

        let base = self.address.as_str().trim_end_matches('/');
        let url = format!("{}/v1/{}", base, encoded.join("/"));
        Url::parse(&url).map_err(|e| Error::InvalidInput(format!("Invalid path '{}': {}", api_path, e)))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .header(TOKEN_HEADER, self.token.expose());

        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        request
    }

    /// List keys under an API path.
    ///
    /// Returns `None` when Vault answers 404.
    pub async fn list(&self, api_path: &str) -> Result<Option<Vec<String>>> {
        let url = self.endpoint(api_path)?;

        let response = self
            .request(reqwest::Method::GET, url)
            .query(&[("list", "true")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list '{}': {}", api_path, e)))?;

        let envelope: Option<Envelope<KeyList>> = self.handle_response(api_path, response).await?;
        Ok(envelope.map(|e| e.data.map(|d| d.keys).unwrap_or_default()))
    }

    /// Read the `data` object at an API path.
    ///
    /// Returns `None` when Vault answers 404 or the response has no data.
    pub async fn read(&self, api_path: &str) -> Result<Option<serde_json::Value>> {
        let url = self.endpoint(api_path)?;

        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to read '{}': {}", api_path, e)))?;

        let envelope: Option<Envelope<serde_json::Value>> =
            self.handle_response(api_path, response).await?;
        Ok(envelope.and_then(|e| e.data).filter(|d| !d.is_null()))
    }

    /// Write a JSON body to an API path.
    pub async fn write(&self, api_path: &str, body: &serde_json::Value) -> Result<()> {
        let url = self.endpoint(api_path)?;

        let response = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to write '{}': {}", api_path, e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from(api_path, status, response).await)
        }
    }

    /// Decode a successful response, mapping 404 to `None`.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        api_path: &str,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map(Some)
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Ok(None)
        } else {
            Err(Self::error_from(api_path, status, response).await)
        }
    }

    async fn error_from(api_path: &str, status: StatusCode, response: reqwest::Response) -> Error {
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let detail = if body.errors.is_empty() {
            "no details".to_string()
        } else {
            body.errors.join("; ")
        };
        Error::Store(format!("{} on '{}': {}", status, api_path, detail))
    }
}
