//! Error types for request validation.

use thiserror::Error;

/// The request could not be turned into a valid, typed reconciliation.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The payload is not valid JSON or does not match the schema.
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is empty.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but unusable.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// Field name as it appears in the request.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Update and Delete need the token returned by Create.
    #[error("{0} request requires a prior identity token")]
    MissingIdentityToken(&'static str),
}

/// Result type alias for validation.
pub type Result<T> = std::result::Result<T, SpecError>;
