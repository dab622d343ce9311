//! Reconciliation requests.
//!
//! Requests arrive as JSON from the orchestrator. They are deserialized into
//! boundary structs that mirror the wire format and then validated into the
//! typed [`ReconcileRequest`] / [`SecretVersionRequest`] the engine consumes.

use serde::Deserialize;

use crate::error::{Result, SpecError};
use crate::policy::{IfMissing, OnCreateIfExists, OnDelete, Policies, UpdateMode};
use crate::statement::validate_identifier;

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Lifecycle event driving a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    /// Returns the event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// Desired state of one user/database pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub host: String,
    pub port: u16,
    /// Secret holding the administrative login.
    pub admin_secret_id: String,
    /// Secret holding the managed user's login.
    pub user_secret_id: String,
    pub database_name: String,
    pub policies: Policies,
}

impl ResourceSpec {
    /// Creates a spec with default policies and port.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        admin_secret_id: impl Into<String>,
        user_secret_id: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            admin_secret_id: admin_secret_id.into(),
            user_secret_id: user_secret_id.into(),
            database_name: database_name.into(),
            policies: Policies::default(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replaces the policies.
    #[must_use]
    pub const fn policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    /// Checks the invariants a spec must hold before any I/O happens.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SpecError::MissingField("host"));
        }
        if self.host.contains('/') {
            return Err(SpecError::InvalidField {
                field: "host",
                reason: "must not contain '/'".to_string(),
            });
        }
        if self.port == 0 {
            return Err(SpecError::InvalidField {
                field: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if self.admin_secret_id.trim().is_empty() {
            return Err(SpecError::MissingField("adminSecretId"));
        }
        if self.user_secret_id.trim().is_empty() {
            return Err(SpecError::MissingField("userSecretId"));
        }
        validate_identifier("databaseName", &self.database_name)?;
        if self.database_name.contains('/') {
            return Err(SpecError::InvalidField {
                field: "databaseName",
                reason: "must not contain '/'".to_string(),
            });
        }
        Ok(())
    }
}

/// A validated reconciliation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub request_type: RequestType,
    /// Token returned by the Create, always present for Update and Delete.
    pub prior_identity_token: Option<String>,
    pub spec: ResourceSpec,
}

impl ReconcileRequest {
    /// Builds and validates a request.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] if the spec is invalid or an Update/Delete
    /// carries no identity token.
    pub fn new(
        request_type: RequestType,
        prior_identity_token: Option<String>,
        spec: ResourceSpec,
    ) -> Result<Self> {
        spec.validate()?;
        let prior_identity_token = prior_identity_token.filter(|t| !t.is_empty());
        if request_type != RequestType::Create && prior_identity_token.is_none() {
            return Err(SpecError::MissingIdentityToken(request_type.as_str()));
        }
        Ok(Self {
            request_type,
            prior_identity_token,
            spec,
        })
    }

    /// Parses and validates a JSON request.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Json`] for malformed payloads and the validation
    /// errors of [`ReconcileRequest::new`].
    pub fn from_json(payload: &str) -> Result<Self> {
        let raw: RawReconcileRequest = serde_json::from_str(payload)?;
        Self::new(
            raw.request_type,
            raw.prior_identity_token,
            raw.spec.into_spec(),
        )
    }

    /// Returns the prior token, which validation guarantees for Update and
    /// Delete.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::MissingIdentityToken`] if no token was supplied.
    pub fn prior_token(&self) -> Result<&str> {
        self.prior_identity_token
            .as_deref()
            .ok_or(SpecError::MissingIdentityToken(self.request_type.as_str()))
    }
}

/// A validated secret-version request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersionRequest {
    pub request_type: RequestType,
    pub secret_id: String,
    /// Version id recorded by the orchestrator, echoed back on Delete.
    pub prior_version_id: Option<String>,
}

impl SecretVersionRequest {
    /// Parses and validates a JSON request.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] for malformed payloads, an empty secret id, or
    /// a Delete without a prior version id.
    pub fn from_json(payload: &str) -> Result<Self> {
        let raw: RawSecretVersionRequest = serde_json::from_str(payload)?;
        if raw.secret_id.trim().is_empty() {
            return Err(SpecError::MissingField("secretId"));
        }
        let prior_version_id = raw.prior_version_id.filter(|v| !v.is_empty());
        if raw.request_type == RequestType::Delete && prior_version_id.is_none() {
            return Err(SpecError::MissingField("priorVersionId"));
        }
        Ok(Self {
            request_type: raw.request_type,
            secret_id: raw.secret_id,
            prior_version_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawReconcileRequest {
    request_type: RequestType,
    #[serde(default)]
    prior_identity_token: Option<String>,
    spec: RawResourceSpec,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawResourceSpec {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    admin_secret_id: String,
    user_secret_id: String,
    database_name: String,
    #[serde(default)]
    on_create_if_exists: OnCreateIfExists,
    #[serde(default)]
    on_delete: OnDelete,
    #[serde(default)]
    on_update_if_user_does_not_exist: IfMissing,
    #[serde(default)]
    on_update_if_database_does_not_exist: IfMissing,
    #[serde(default)]
    on_update_set_user_password: UpdateMode,
    #[serde(default)]
    on_update_set_user_permissions: UpdateMode,
    #[serde(default)]
    on_update_set_database_ownership: UpdateMode,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl RawResourceSpec {
    fn into_spec(self) -> ResourceSpec {
        ResourceSpec {
            host: self.host,
            port: self.port,
            admin_secret_id: self.admin_secret_id,
            user_secret_id: self.user_secret_id,
            database_name: self.database_name,
            policies: Policies {
                on_create_if_exists: self.on_create_if_exists,
                on_delete: self.on_delete,
                on_update_if_user_does_not_exist: self.on_update_if_user_does_not_exist,
                on_update_if_database_does_not_exist: self.on_update_if_database_does_not_exist,
                on_update_set_user_password: self.on_update_set_user_password,
                on_update_set_user_permissions: self.on_update_set_user_permissions,
                on_update_set_database_ownership: self.on_update_set_database_ownership,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSecretVersionRequest {
    request_type: RequestType,
    secret_id: String,
    #[serde(default)]
    prior_version_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE: &str = r#"{
        "requestType": "Create",
        "spec": {
            "host": "db.local",
            "adminSecretId": "admin",
            "userSecretId": "svc",
            "databaseName": "app"
        }
    }"#;

    #[test]
    fn test_minimal_create_uses_defaults() {
        let request = ReconcileRequest::from_json(CREATE).unwrap();
        assert_eq!(request.request_type, RequestType::Create);
        assert_eq!(request.spec.port, DEFAULT_PORT);
        assert_eq!(request.spec.policies, Policies::default());
        assert!(request.prior_identity_token.is_none());
    }

    #[test]
    fn test_full_update() {
        let request = ReconcileRequest::from_json(
            r#"{
                "requestType": "Update",
                "priorIdentityToken": "db.local/app/svc",
                "spec": {
                    "host": "db.local",
                    "port": 6432,
                    "adminSecretId": "admin",
                    "userSecretId": "svc",
                    "databaseName": "app",
                    "onCreateIfExists": "Adopt",
                    "onDelete": "Retain",
                    "onUpdateIfUserDoesNotExist": "Create",
                    "onUpdateIfDatabaseDoesNotExist": "Create",
                    "onUpdateSetUserPassword": "Always",
                    "onUpdateSetUserPermissions": "Always",
                    "onUpdateSetDatabaseOwnership": "Always"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(request.prior_token().unwrap(), "db.local/app/svc");
        assert_eq!(request.spec.port, 6432);
        let policies = request.spec.policies;
        assert_eq!(policies.on_create_if_exists, OnCreateIfExists::Adopt);
        assert_eq!(policies.on_delete, OnDelete::Retain);
        assert!(policies.on_update_if_user_does_not_exist.creates());
        assert!(policies.on_update_if_database_does_not_exist.creates());
        assert!(policies.on_update_set_user_password.applies());
        assert!(policies.on_update_set_user_permissions.applies());
        assert!(policies.on_update_set_database_ownership.applies());
    }

    #[test]
    fn test_update_without_token_rejected() {
        let payload = CREATE.replace("\"Create\"", "\"Update\"");
        let err = ReconcileRequest::from_json(&payload).unwrap_err();
        assert!(matches!(err, SpecError::MissingIdentityToken("Update")));
    }

    #[test]
    fn test_delete_with_empty_token_rejected() {
        let spec = ResourceSpec::new("db.local", "admin", "svc", "app");
        let err = ReconcileRequest::new(RequestType::Delete, Some(String::new()), spec).unwrap_err();
        assert!(matches!(err, SpecError::MissingIdentityToken("Delete")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let payload = CREATE.replace("\"databaseName\"", "\"onCreateIfExist\": \"Adopt\", \"databaseName\"");
        assert!(matches!(
            ReconcileRequest::from_json(&payload),
            Err(SpecError::Json(_))
        ));
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let payload = r#"{"requestType": "Create", "spec": {"host": "db.local", "adminSecretId": "a", "userSecretId": "u"}}"#;
        assert!(matches!(
            ReconcileRequest::from_json(payload),
            Err(SpecError::Json(_))
        ));
    }

    #[test]
    fn test_spec_validation() {
        let base = ResourceSpec::new("db.local", "admin", "svc", "app");
        assert!(base.validate().is_ok());

        let empty_host = ResourceSpec {
            host: " ".to_string(),
            ..base.clone()
        };
        assert!(matches!(
            empty_host.validate(),
            Err(SpecError::MissingField("host"))
        ));

        let zero_port = base.clone().port(0);
        assert!(matches!(
            zero_port.validate(),
            Err(SpecError::InvalidField { field: "port", .. })
        ));

        let slash_db = ResourceSpec {
            database_name: "a/b".to_string(),
            ..base.clone()
        };
        assert!(slash_db.validate().is_err());

        let no_user_secret = ResourceSpec {
            user_secret_id: String::new(),
            ..base
        };
        assert!(matches!(
            no_user_secret.validate(),
            Err(SpecError::MissingField("userSecretId"))
        ));
    }

    #[test]
    fn test_secret_version_request() {
        let create = SecretVersionRequest::from_json(
            r#"{"requestType": "Create", "secretId": "svc"}"#,
        )
        .unwrap();
        assert_eq!(create.secret_id, "svc");
        assert!(create.prior_version_id.is_none());

        let delete = SecretVersionRequest::from_json(
            r#"{"requestType": "Delete", "secretId": "svc", "priorVersionId": "v3"}"#,
        )
        .unwrap();
        assert_eq!(delete.prior_version_id.as_deref(), Some("v3"));

        assert!(matches!(
            SecretVersionRequest::from_json(r#"{"requestType": "Delete", "secretId": "svc"}"#),
            Err(SpecError::MissingField("priorVersionId"))
        ));
        assert!(matches!(
            SecretVersionRequest::from_json(r#"{"requestType": "Create", "secretId": ""}"#),
            Err(SpecError::MissingField("secretId"))
        ));
    }
}
