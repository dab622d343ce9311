//! Username/password pairs resolved from a secret store.

use std::fmt;

use serde::Deserialize;

/// A resolved login.
///
/// The `Debug` output never contains the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Role name.
    pub username: String,
    /// Cleartext password, sent to the server only inside SQL literals or
    /// the authentication handshake.
    pub password: String,
}

impl Credentials {
    /// Creates a new credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
