//! Database sessions and their lifecycle.
//!
//! A [`ConnectionManager`] owns at most one credential pair and one session
//! for a single (secret, host, port, database) tuple. Both are resolved
//! lazily on first use and memoized for the rest of the reconciliation. The
//! session is released by [`ConnectionManager::close`], which the engine
//! calls on every exit path.
//!
//! The transport sits behind the [`Connector`] and [`Session`] traits.
//! [`PgConnector`] is the `sqlx` implementation.

use std::sync::Arc;

use async_trait::async_trait;
use oxide_provision_core::{Credentials, DatabaseError, Statement};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info, warn};

use crate::config::SslMode;
use crate::error::{ProvisionError, Result};
use crate::secrets::SecretResolver;

/// Where a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl ConnectTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
        }
    }
}

/// One live, authenticated session.
#[async_trait]
pub trait Session: Send {
    /// Executes a single statement.
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<(), DatabaseError>;

    /// Terminates the session. Further calls to `execute` fail.
    async fn close(&mut self) -> std::result::Result<(), DatabaseError>;
}

/// Opens sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Authenticates as `credentials` against `target`.
    async fn connect(
        &self,
        target: &ConnectTarget,
        credentials: &Credentials,
    ) -> std::result::Result<Box<dyn Session>, DatabaseError>;
}

/// Converts a driver error, keeping the SQLSTATE when the server sent one.
#[must_use]
pub fn database_error(err: &sqlx::Error) -> DatabaseError {
    match err.as_database_error() {
        Some(db_err) => match db_err.code() {
            Some(code) => DatabaseError::with_code(db_err.message(), code),
            None => DatabaseError::without_code(db_err.message()),
        },
        None => DatabaseError::without_code(err.to_string()),
    }
}

/// Connects to PostgreSQL through `sqlx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector {
    ssl_mode: SslMode,
}

impl PgConnector {
    /// Creates a connector using `ssl_mode` for every session.
    #[must_use]
    pub const fn new(ssl_mode: SslMode) -> Self {
        Self { ssl_mode }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
        credentials: &Credentials,
    ) -> std::result::Result<Box<dyn Session>, DatabaseError> {
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.database)
            .username(&credentials.username)
            .password(&credentials.password)
            .ssl_mode(self.ssl_mode.into())
            .application_name("oxide-provision")
            .disable_statement_logging();
        let conn = options.connect().await.map_err(|e| database_error(&e))?;
        Ok(Box::new(PgSession { conn: Some(conn) }))
    }
}

/// A `sqlx` PostgreSQL session.
pub struct PgSession {
    conn: Option<PgConnection>,
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<(), DatabaseError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DatabaseError::without_code("session is closed"))?;
        // DDL cannot be prepared, so use the simple query protocol.
        let sql = statement.to_sql();
        sqlx::Executor::execute(conn, sqlx::raw_sql(&sql))
            .await
            .map_err(|e| database_error(&e))?;
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), DatabaseError> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(|e| database_error(&e)),
            None => Ok(()),
        }
    }
}

/// A lazily resolved value: unresolved until the first successful resolve,
/// then resolved until taken.
#[derive(Debug)]
pub struct Slot<T>(Option<T>);

impl<T> Slot<T> {
    /// Creates an unresolved slot.
    #[must_use]
    pub const fn unresolved() -> Self {
        Self(None)
    }

    /// Returns true once a value is held.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.0.is_some()
    }

    /// Removes the value, leaving the slot unresolved.
    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }

    /// Stores `value` and returns a reference to it.
    pub fn insert(&mut self, value: T) -> &mut T {
        self.0.insert(value)
    }
}

/// Owns the credentials and session for one secret against one target.
pub struct ConnectionManager {
    role: &'static str,
    secret_id: String,
    target: ConnectTarget,
    resolver: Arc<dyn SecretResolver>,
    connector: Arc<dyn Connector>,
    credentials: Slot<Credentials>,
    session: Slot<Box<dyn Session>>,
}

impl ConnectionManager {
    /// Creates a manager. `role` labels log lines (`"admin"`, `"user"`).
    #[must_use]
    pub fn new(
        role: &'static str,
        secret_id: impl Into<String>,
        target: ConnectTarget,
        resolver: Arc<dyn SecretResolver>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            role,
            secret_id: secret_id.into(),
            target,
            resolver,
            connector,
            credentials: Slot::unresolved(),
            session: Slot::unresolved(),
        }
    }

    /// Returns true while a session is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_resolved()
    }

    /// Resolves the credentials once and returns them.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Secret`] if the secret cannot be resolved.
    pub async fn credentials(&mut self) -> Result<&Credentials> {
        let credentials = match self.credentials.take() {
            Some(credentials) => credentials,
            None => {
                let credentials = self.resolver.resolve(&self.secret_id).await?;
                debug!(
                    role = self.role,
                    secret_id = %self.secret_id,
                    username = %credentials.username,
                    "Resolved credentials"
                );
                credentials
            }
        };
        Ok(self.credentials.insert(credentials))
    }

    /// Opens the session on first use and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Secret`] or [`ProvisionError::Connect`].
    pub async fn session(&mut self) -> Result<&mut dyn Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let credentials = self.credentials().await?.clone();
                info!(
                    role = self.role,
                    host = %self.target.host,
                    port = self.target.port,
                    database = %self.target.database,
                    username = %credentials.username,
                    "Connecting"
                );
                self.connector
                    .connect(&self.target, &credentials)
                    .await
                    .map_err(|source| ProvisionError::Connect {
                        host: self.target.host.clone(),
                        port: self.target.port,
                        database: self.target.database.clone(),
                        username: credentials.username.clone(),
                        source,
                    })?
            }
        };
        Ok(self.session.insert(session).as_mut())
    }

    /// Executes `statement` on this manager's session.
    ///
    /// # Errors
    ///
    /// Returns connection errors from [`ConnectionManager::session`], or
    /// [`ProvisionError::Database`] if the statement fails.
    pub async fn execute(&mut self, statement: &Statement) -> Result<()> {
        let role = self.role;
        let session = self.session().await?;
        debug!(role, statement = %statement, "Executing SQL");
        session
            .execute(statement)
            .await
            .map_err(|source| ProvisionError::statement(statement, source))
    }

    /// Closes the session if one was opened. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close().await {
                Ok(()) => debug!(role = self.role, "Closed session"),
                Err(err) => warn!(role = self.role, error = %err, "Failed to close session"),
            }
        }
    }
}
