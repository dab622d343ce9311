//! Declarative PostgreSQL user and database provisioning.
//!
//! `oxide-provision` brings one user and one database on a PostgreSQL server
//! into agreement with a desired state, driven by Create / Update / Delete
//! events from an external orchestrator:
//! - Every mutating statement is guarded by a named policy, so operators pick
//!   safe-by-default or self-healing behavior per axis
//! - Re-running a request after a partial failure converges instead of
//!   compounding errors
//! - A stable identity token (`host/database/username`) ties Update and
//!   Delete to the object Create made
//!
//! # Architecture
//!
//! - **Secrets** - [`SecretResolver`] turns secret ids into logins
//! - **Connections** - [`ConnectionManager`] lazily resolves, connects and
//!   memoizes one session per login, and closes it on every exit path
//! - **Engine** - [`Reconciler`] runs the event state machine
//! - **Secret versions** - [`SecretVersionReconciler`] reports the active
//!   version of a secret so rotation can trigger an Update
//!
//! Policies, request validation, identity tokens, error classification and
//! SQL rendering live in `oxide-provision-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oxide_provision::prelude::*;
//!
//! let secrets = Arc::new(FileSecretStore::new("/run/secrets/db.json"));
//! let reconciler = Reconciler::postgres(secrets, ProvisionConfig::default());
//!
//! let request = ReconcileRequest::from_json(payload)?;
//! let token = reconciler.reconcile(&request).await?;
//! println!("{token}");
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create, update or delete a user/database pair
//! oxide-provision --secrets-file secrets.json reconcile --request create.json
//!
//! # Report the active version of a secret
//! oxide-provision --secrets-file secrets.json secret-version --request version.json
//!
//! # Show the statements a Create would issue
//! oxide-provision --secrets-file secrets.json sql --request create.json
//! ```

pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod secret_version;
pub mod secrets;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ProvisionConfig, SslMode};
    pub use crate::connection::{ConnectTarget, ConnectionManager, Connector, PgConnector, Session};
    pub use crate::engine::Reconciler;
    pub use crate::error::{ProvisionError, Result};
    pub use crate::secret_version::SecretVersionReconciler;
    pub use crate::secrets::{FileSecretStore, SecretError, SecretResolver, StaticSecretStore};
    pub use oxide_provision_core::{
        Credentials, DatabaseError, ErrorKind, IdentityToken, IfMissing, OnCreateIfExists,
        OnDelete, Policies, ReconcileRequest, RequestType, ResourceSpec, SecretVersionRequest,
        Statement, UpdateMode,
    };
}

pub use config::ProvisionConfig;
pub use connection::ConnectionManager;
pub use engine::Reconciler;
pub use error::{ProvisionError, Result};
pub use secret_version::SecretVersionReconciler;
pub use secrets::{FileSecretStore, SecretResolver, StaticSecretStore};
