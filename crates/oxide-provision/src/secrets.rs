//! Secret resolution.
//!
//! The reconciler never stores credentials. It asks a [`SecretResolver`] for
//! the login behind an opaque secret id once per reconciliation. Two
//! resolvers ship with the crate: [`FileSecretStore`], which reads a JSON
//! document, and [`StaticSecretStore`], an in-memory map for embedding and
//! tests. Production deployments plug in their own secret manager behind
//! the same trait.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use oxide_provision_core::Credentials;
use serde::Deserialize;
use tracing::debug;

/// Errors raised while resolving a secret.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// No secret with this id.
    #[error("secret '{0}' not found")]
    NotFound(String),

    /// The secret exists but lacks a string `username` or `password`.
    #[error("secret '{id}' is malformed: {reason}")]
    Malformed {
        /// Secret id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The secret has no version id.
    #[error("secret '{0}' has no version id")]
    NoVersion(String),

    /// Reading the backing file failed.
    #[error("failed to read secrets file '{path}': {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of secrets.
    #[error("secrets file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of credentials and secret versions.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Returns the username/password pair stored under `secret_id`.
    async fn resolve(&self, secret_id: &str) -> Result<Credentials, SecretError>;

    /// Returns the currently active version id of `secret_id`.
    async fn current_version(&self, secret_id: &str) -> Result<String, SecretError>;
}

/// A stored secret with its optional version.
#[derive(Debug, Clone)]
struct StoredSecret {
    value: serde_json::Value,
    version_id: Option<String>,
}

impl StoredSecret {
    fn credentials(&self, id: &str) -> Result<Credentials, SecretError> {
        serde_json::from_value(self.value.clone()).map_err(|err| SecretError::Malformed {
            id: id.to_string(),
            reason: err.to_string(),
        })
    }
}

/// In-memory secret store.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, StoredSecret>,
}

impl StaticSecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret holding `credentials` at `version_id`.
    #[must_use]
    pub fn with_secret(
        mut self,
        id: impl Into<String>,
        credentials: &Credentials,
        version_id: impl Into<String>,
    ) -> Self {
        self.secrets.insert(
            id.into(),
            StoredSecret {
                value: serde_json::json!({
                    "username": credentials.username,
                    "password": credentials.password,
                }),
                version_id: Some(version_id.into()),
            },
        );
        self
    }

    /// Adds a secret with an arbitrary JSON payload and no version.
    #[must_use]
    pub fn with_raw_secret(mut self, id: impl Into<String>, value: serde_json::Value) -> Self {
        self.secrets.insert(
            id.into(),
            StoredSecret {
                value,
                version_id: None,
            },
        );
        self
    }

    fn get(&self, secret_id: &str) -> Result<&StoredSecret, SecretError> {
        self.secrets
            .get(secret_id)
            .ok_or_else(|| SecretError::NotFound(secret_id.to_string()))
    }
}

#[async_trait]
impl SecretResolver for StaticSecretStore {
    async fn resolve(&self, secret_id: &str) -> Result<Credentials, SecretError> {
        self.get(secret_id)?.credentials(secret_id)
    }

    async fn current_version(&self, secret_id: &str) -> Result<String, SecretError> {
        self.get(secret_id)?
            .version_id
            .clone()
            .ok_or_else(|| SecretError::NoVersion(secret_id.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    #[serde(default)]
    version_id: Option<String>,
    #[serde(flatten)]
    value: serde_json::Map<String, serde_json::Value>,
}

/// Secrets read from a JSON file.
///
/// The file maps secret ids to objects:
///
/// ```json
/// {
///   "admin": { "username": "root", "password": "...", "versionId": "v1" },
///   "svc":   { "username": "svc",  "password": "...", "versionId": "v7" }
/// }
/// ```
///
/// The file is re-read on every lookup so rotated secrets are picked up
/// without restarting.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self, secret_id: &str) -> Result<StoredSecret, SecretError> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| SecretError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        let mut entries: HashMap<String, FileEntry> = serde_json::from_str(&contents)?;
        let entry = entries
            .remove(secret_id)
            .ok_or_else(|| SecretError::NotFound(secret_id.to_string()))?;
        debug!(secret_id, path = %self.path.display(), "Loaded secret from file");
        Ok(StoredSecret {
            value: serde_json::Value::Object(entry.value),
            version_id: entry.version_id,
        })
    }
}

#[async_trait]
impl SecretResolver for FileSecretStore {
    async fn resolve(&self, secret_id: &str) -> Result<Credentials, SecretError> {
        self.load(secret_id).await?.credentials(secret_id)
    }

    async fn current_version(&self, secret_id: &str) -> Result<String, SecretError> {
        self.load(secret_id)
            .await?
            .version_id
            .ok_or_else(|| SecretError::NoVersion(secret_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn secrets_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_file_store_resolves_credentials() {
        let file = secrets_file(
            r#"{"svc": {"username": "svc", "password": "pw", "versionId": "v2"}}"#,
        );
        let store = FileSecretStore::new(file.path());

        let creds = store.resolve("svc").await.unwrap();
        assert_eq!(creds, Credentials::new("svc", "pw"));
        assert_eq!(store.current_version("svc").await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_file_store_ignores_extra_secret_fields() {
        let file = secrets_file(
            r#"{"svc": {"username": "svc", "password": "pw", "engine": "postgres", "port": 5432}}"#,
        );
        let store = FileSecretStore::new(file.path());
        assert_eq!(
            store.resolve("svc").await.unwrap(),
            Credentials::new("svc", "pw")
        );
    }

    #[tokio::test]
    async fn test_file_store_missing_secret() {
        let file = secrets_file(r#"{}"#);
        let store = FileSecretStore::new(file.path());
        assert!(matches!(
            store.resolve("svc").await,
            Err(SecretError::NotFound(id)) if id == "svc"
        ));
    }

    #[tokio::test]
    async fn test_file_store_malformed_secret() {
        let file = secrets_file(r#"{"svc": {"username": "svc", "password": 12}}"#);
        let store = FileSecretStore::new(file.path());
        assert!(matches!(
            store.resolve("svc").await,
            Err(SecretError::Malformed { id, reason }) if id == "svc" && reason.contains("invalid type")
        ));
        assert!(matches!(
            store.current_version("svc").await,
            Err(SecretError::NoVersion(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_unreadable_file() {
        let store = FileSecretStore::new("/nonexistent/oxide-provision/secrets.json");
        assert!(matches!(
            store.resolve("svc").await,
            Err(SecretError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticSecretStore::new()
            .with_secret("admin", &Credentials::new("root", "toor"), "v1")
            .with_raw_secret("broken", serde_json::json!({"username": "x"}));

        assert_eq!(store.resolve("admin").await.unwrap().username, "root");
        assert_eq!(store.current_version("admin").await.unwrap(), "v1");
        assert!(matches!(
            store.resolve("broken").await,
            Err(SecretError::Malformed { .. })
        ));
        assert!(matches!(
            store.resolve("missing").await,
            Err(SecretError::NotFound(_))
        ));
    }
}
