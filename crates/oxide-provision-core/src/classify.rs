//! Classification of raw database errors.
//!
//! The reconciler only ever branches on a closed set of conditions. Anything
//! without a recognized SQLSTATE is [`ErrorKind::Unknown`] and callers must
//! re-raise it.

use std::fmt;

/// SQLSTATE `42710`, raised by `CREATE ROLE`/`CREATE USER` for an existing role.
pub const DUPLICATE_OBJECT: &str = "42710";
/// SQLSTATE `42P04`, raised by `CREATE DATABASE` for an existing database.
pub const DUPLICATE_DATABASE: &str = "42P04";
/// SQLSTATE `2BP01`, raised by `DROP ROLE` while the role still owns objects.
pub const DEPENDENT_OBJECTS_STILL_EXIST: &str = "2BP01";
/// SQLSTATE `42501`.
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
/// SQLSTATE `28P01`.
pub const INVALID_PASSWORD: &str = "28P01";
/// SQLSTATE `28000`.
pub const INVALID_AUTHORIZATION_SPECIFICATION: &str = "28000";

/// A raw error reported by the database or its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    /// Human-readable message from the server or driver.
    pub message: String,
    /// SQLSTATE, present only when the server produced the error.
    pub code: Option<String>,
}

impl DatabaseError {
    /// Creates an error carrying a SQLSTATE.
    #[must_use]
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Creates an error without a SQLSTATE (I/O, protocol, TLS failures).
    #[must_use]
    pub fn without_code(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        classify(self)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (SQLSTATE {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DatabaseError {}

/// Known database conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateUser,
    DuplicateDatabase,
    DependentObjects,
    InsufficientPrivilege,
    AuthenticationFailed,
    Unknown,
}

/// Maps a raw error to its [`ErrorKind`].
#[must_use]
pub fn classify(error: &DatabaseError) -> ErrorKind {
    match error.code.as_deref() {
        Some(DUPLICATE_OBJECT) => ErrorKind::DuplicateUser,
        Some(DUPLICATE_DATABASE) => ErrorKind::DuplicateDatabase,
        Some(DEPENDENT_OBJECTS_STILL_EXIST) => ErrorKind::DependentObjects,
        Some(INSUFFICIENT_PRIVILEGE) => ErrorKind::InsufficientPrivilege,
        Some(INVALID_PASSWORD | INVALID_AUTHORIZATION_SPECIFICATION) => {
            ErrorKind::AuthenticationFailed
        }
        _ => ErrorKind::Unknown,
    }
}
