//! Identity tokens.
//!
//! The token is the durable handle the orchestrator stores after a Create and
//! hands back on every Update and Delete. It is derived from
//! `host/database/username`, so a changed host, database name or username
//! produces a different token. Update and Delete refuse to run when the token
//! they were given does not match the one recomputed from current inputs.

use std::fmt;

use thiserror::Error;

/// Stable identity of a managed (host, database, user) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityToken(String);

/// The supplied identity token does not describe the current inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "cannot change database name or username: resource was created as '{expected}' but now resolves to '{actual}'"
)]
pub struct IdentityMismatch {
    /// Token supplied by the caller.
    pub expected: String,
    /// Token recomputed from the current spec and credentials.
    pub actual: String,
}

impl IdentityToken {
    /// Derives the token for a host, database and username.
    #[must_use]
    pub fn compute(host: &str, database_name: &str, username: &str) -> Self {
        Self(format!("{host}/{database_name}/{username}"))
    }

    /// Recomputes the token and checks it against `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityMismatch`] if the tokens differ.
    pub fn validate(
        expected: &str,
        host: &str,
        database_name: &str,
        username: &str,
    ) -> Result<Self, IdentityMismatch> {
        let actual = Self::compute(host, database_name, username);
        if actual.0 == expected {
            Ok(actual)
        } else {
            Err(IdentityMismatch {
                expected: expected.to_string(),
                actual: actual.0,
            })
        }
    }

    /// Wraps a token supplied by the caller without recomputing it.
    ///
    /// Used only where the caller's token is echoed back untouched.
    #[must_use]
    pub fn unchecked(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token and returns its text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
