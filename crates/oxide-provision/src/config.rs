//! Connection configuration shared by every reconciliation.

use sqlx::postgres::PgSslMode;

/// Database both sessions attach to when none is specified.
pub const DEFAULT_ADMIN_DATABASE: &str = "postgres";

/// TLS mode for server connections.
///
/// `Require` is the default: traffic is encrypted but the server certificate
/// is not validated. Use `VerifyCa` or `VerifyFull` where the server presents
/// a certificate the host trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SslMode {
    Disable,
    Prefer,
    #[default]
    Require,
    VerifyCa,
    VerifyFull,
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => Self::Disable,
            SslMode::Prefer => Self::Prefer,
            SslMode::Require => Self::Require,
            SslMode::VerifyCa => Self::VerifyCa,
            SslMode::VerifyFull => Self::VerifyFull,
        }
    }
}

/// Settings applied to every session the reconciler opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Maintenance database used by both the admin and the user session.
    pub admin_database: String,
    /// TLS mode.
    pub ssl_mode: SslMode,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            admin_database: DEFAULT_ADMIN_DATABASE.to_string(),
            ssl_mode: SslMode::default(),
        }
    }
}

impl ProvisionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maintenance database.
    #[must_use]
    pub fn admin_database(mut self, database: impl Into<String>) -> Self {
        self.admin_database = database.into();
        self
    }

    /// Sets the TLS mode.
    #[must_use]
    pub const fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }
}
