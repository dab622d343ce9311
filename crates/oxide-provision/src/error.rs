//! Error types for reconciliation.

use oxide_provision_core::{DatabaseError, ErrorKind, IdentityMismatch, SpecError, Statement};

use crate::secrets::SecretError;

/// Errors that abort a reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The request or spec is invalid.
    #[error("Invalid configuration: {0}")]
    Spec(#[from] SpecError),

    /// Update/Delete identity does not match the current inputs.
    #[error(transparent)]
    Identity(#[from] IdentityMismatch),

    /// The admin and target secrets resolve to the same role.
    #[error("Admin user and target user are both '{username}'; refusing to manage the admin role")]
    UsernameCollision {
        /// The shared username.
        username: String,
    },

    /// Secret resolution failed.
    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    /// Could not open a session.
    #[error("Failed to connect to {host}:{port}/{database} as '{username}': {source}")]
    Connect {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
        /// Database the session was opened against.
        database: String,
        /// Role used to authenticate.
        username: String,
        /// Underlying error.
        source: DatabaseError,
    },

    /// A statement failed and no policy suppressed it.
    #[error("Statement `{statement}` failed: {source}")]
    Database {
        /// Redacted statement text.
        statement: String,
        /// Underlying error.
        source: DatabaseError,
    },
}

impl ProvisionError {
    /// Wraps a failed statement. The statement is stored in its redacted form.
    #[must_use]
    pub fn statement(statement: &Statement, source: DatabaseError) -> Self {
        Self::Database {
            statement: statement.to_string(),
            source,
        }
    }

    /// Classification of a failed statement's error.
    ///
    /// Connection and secret failures return `None`: only statement errors
    /// are ever candidates for policy-driven suppression.
    #[must_use]
    pub fn statement_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Database { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ProvisionError>;
