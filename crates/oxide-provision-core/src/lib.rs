//! # oxide-provision-core
//!
//! The I/O-free half of `oxide-provision`: everything the reconciler needs to
//! decide what to do, with none of the connection handling.
//!
//! This crate provides:
//! - Conflict-resolution [`policy`] enums, each defaulting to the safe choice
//! - The typed [`ReconcileRequest`] and its JSON boundary schema
//! - The [`IdentityToken`] codec (`host/database/username`)
//! - A total [`classify`] function over PostgreSQL SQLSTATEs
//! - [`Statement`] rendering with identifier and literal quoting
//!
//! ## Identity tokens
//!
//! ```rust
//! use oxide_provision_core::IdentityToken;
//!
//! let token = IdentityToken::compute("db.local", "app", "svc");
//! assert_eq!(token.as_str(), "db.local/app/svc");
//! assert!(IdentityToken::validate("db.local/app/svc", "db.local", "app", "other").is_err());
//! ```
//!
//! ## Quoting
//!
//! Role and database names are always quoted, so hostile names stay names:
//!
//! ```rust
//! use oxide_provision_core::Statement;
//!
//! let stmt = Statement::create_database("app\"; DROP DATABASE prod; --");
//! assert_eq!(stmt.to_sql(), "CREATE DATABASE \"app\"\"; DROP DATABASE prod; --\"");
//! ```

pub mod classify;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod policy;
pub mod request;
pub mod statement;

pub use classify::{classify, DatabaseError, ErrorKind};
pub use credentials::Credentials;
pub use error::{Result, SpecError};
pub use identity::{IdentityMismatch, IdentityToken};
pub use policy::{IfMissing, OnCreateIfExists, OnDelete, Policies, UpdateMode};
pub use request::{ReconcileRequest, RequestType, ResourceSpec, SecretVersionRequest};
pub use statement::Statement;
