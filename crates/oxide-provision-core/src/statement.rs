//! SQL statements issued by the reconciler.
//!
//! Role and database DDL cannot take bind parameters, so names and passwords
//! are rendered inline:
//! - identifiers are always double-quoted with embedded `"` doubled, which
//!   makes them case-sensitive exactly as written;
//! - password literals are single-quoted with embedded `'` doubled, and use
//!   the `E'...'` form with doubled backslashes when a backslash is present,
//!   so the result is independent of `standard_conforming_strings`.
//!
//! The [`Display`](std::fmt::Display) form of a statement masks the password
//! and is the only form that should reach logs or error messages.

use std::fmt;

use crate::error::{Result, SpecError};

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Checks that `value` can be used as a role or database name.
///
/// # Errors
///
/// Returns [`SpecError::MissingField`] for an empty name, and
/// [`SpecError::InvalidField`] for names with NUL bytes or longer than
/// [`MAX_IDENTIFIER_LEN`] bytes (the server would silently truncate those,
/// breaking the identity token).
pub fn validate_identifier(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SpecError::MissingField(field));
    }
    if value.contains('\0') {
        return Err(SpecError::InvalidField {
            field,
            reason: "contains a NUL byte".to_string(),
        });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(SpecError::InvalidField {
            field,
            reason: format!(
                "{} bytes exceeds the {MAX_IDENTIFIER_LEN}-byte identifier limit",
                value.len()
            ),
        });
    }
    Ok(())
}

/// Checks that `value` can be sent as a password literal.
///
/// # Errors
///
/// Returns [`SpecError::InvalidField`] if the password contains a NUL byte.
pub fn validate_password(field: &'static str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(SpecError::InvalidField {
            field,
            reason: "password contains a NUL byte".to_string(),
        });
    }
    Ok(())
}

/// Quotes a role or database name.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        let escaped = escaped.replace('\\', "\\\\");
        format!("E'{escaped}'")
    } else {
        format!("'{escaped}'")
    }
}

/// A single DDL statement.
#[derive(Clone, PartialEq, Eq)]
pub enum Statement {
    CreateUser { name: String, password: String },
    AlterUserPassword { name: String, password: String },
    AlterUserPermissions { name: String },
    DropUser { name: String, if_exists: bool },
    CreateDatabase { name: String },
    DropDatabase { name: String, if_exists: bool },
    AlterDatabaseOwner { name: String, owner: String },
}

impl Statement {
    /// `CREATE USER .. WITH PASSWORD .. CREATEDB LOGIN`.
    #[must_use]
    pub fn create_user(name: &str, password: &str) -> Self {
        Self::CreateUser {
            name: name.to_string(),
            password: password.to_string(),
        }
    }

    #[must_use]
    pub fn alter_user_password(name: &str, password: &str) -> Self {
        Self::AlterUserPassword {
            name: name.to_string(),
            password: password.to_string(),
        }
    }

    #[must_use]
    pub fn alter_user_permissions(name: &str) -> Self {
        Self::AlterUserPermissions {
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn drop_user(name: &str, if_exists: bool) -> Self {
        Self::DropUser {
            name: name.to_string(),
            if_exists,
        }
    }

    #[must_use]
    pub fn create_database(name: &str) -> Self {
        Self::CreateDatabase {
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn drop_database(name: &str, if_exists: bool) -> Self {
        Self::DropDatabase {
            name: name.to_string(),
            if_exists,
        }
    }

    #[must_use]
    pub fn alter_database_owner(name: &str, owner: &str) -> Self {
        Self::AlterDatabaseOwner {
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    /// Renders the statement for execution, password included.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.render(true)
    }

    fn render(&self, reveal_password: bool) -> String {
        let password = |value: &str| {
            if reveal_password {
                quote_literal(value)
            } else {
                String::from("'***'")
            }
        };
        let if_exists = |flag: bool| if flag { "IF EXISTS " } else { "" };

        match self {
            Self::CreateUser { name, password: pw } => format!(
                "CREATE USER {} WITH PASSWORD {} CREATEDB LOGIN",
                quote_identifier(name),
                password(pw)
            ),
            Self::AlterUserPassword { name, password: pw } => format!(
                "ALTER USER {} WITH PASSWORD {}",
                quote_identifier(name),
                password(pw)
            ),
            Self::AlterUserPermissions { name } => {
                format!("ALTER USER {} WITH CREATEDB LOGIN", quote_identifier(name))
            }
            Self::DropUser { name, if_exists: flag } => {
                format!("DROP USER {}{}", if_exists(*flag), quote_identifier(name))
            }
            Self::CreateDatabase { name } => {
                format!("CREATE DATABASE {}", quote_identifier(name))
            }
            Self::DropDatabase { name, if_exists: flag } => {
                format!(
                    "DROP DATABASE {}{}",
                    if_exists(*flag),
                    quote_identifier(name)
                )
            }
            Self::AlterDatabaseOwner { name, owner } => format!(
                "ALTER DATABASE {} OWNER TO {}",
                quote_identifier(name),
                quote_identifier(owner)
            ),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Statement({self})")
    }
}
