//! Conflict-resolution policies.
//!
//! Every mutating statement the reconciler may issue is guarded by one of
//! these switches. Each enum defaults to the conservative choice, so a spec
//! that omits a policy never gets destructive or self-healing behavior it did
//! not ask for.

use serde::{Deserialize, Serialize};

/// What to do on Create when the user or database already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnCreateIfExists {
    /// Re-raise the duplicate-object error.
    #[default]
    Fail,
    /// Take over the existing object: reset the password and grants, or
    /// transfer database ownership.
    Adopt,
    /// Drop the existing object and create it again.
    DeleteAndRecreate,
}

/// What to do with the user and database on Delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnDelete {
    /// Drop both the database and the user.
    #[default]
    Delete,
    /// Leave the server untouched.
    Retain,
}

/// What to do on Update when an object is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IfMissing {
    /// Leave it missing.
    #[default]
    Ignore,
    /// Create it, tolerating a concurrent creation.
    Create,
}

impl IfMissing {
    /// Returns true when the missing object should be created.
    #[must_use]
    pub const fn creates(self) -> bool {
        matches!(self, Self::Create)
    }
}

/// Whether an Update re-applies an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Re-apply the attribute on every Update.
    Always,
    /// Never touch the attribute on Update.
    #[default]
    Never,
}

impl UpdateMode {
    /// Returns true when the attribute should be applied.
    #[must_use]
    pub const fn applies(self) -> bool {
        matches!(self, Self::Always)
    }
}

/// The full set of per-axis policies attached to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policies {
    pub on_create_if_exists: OnCreateIfExists,
    pub on_delete: OnDelete,
    pub on_update_if_user_does_not_exist: IfMissing,
    pub on_update_if_database_does_not_exist: IfMissing,
    pub on_update_set_user_password: UpdateMode,
    pub on_update_set_user_permissions: UpdateMode,
    pub on_update_set_database_ownership: UpdateMode,
}
