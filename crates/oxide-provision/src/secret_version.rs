//! Secret version tracking.
//!
//! The orchestrator runs this as a secondary resource next to the user
//! resource. Its output changes whenever the user's secret rotates, which in
//! turn makes the orchestrator send an Update for the user resource. No
//! attempt is made to tell a rotated password from an unchanged one: any new
//! version forces the Update.

use std::sync::Arc;

use oxide_provision_core::{RequestType, SecretVersionRequest, SpecError};
use tracing::info;

use crate::error::Result;
use crate::secrets::SecretResolver;

/// Reports the active version of a secret.
pub struct SecretVersionReconciler {
    resolver: Arc<dyn SecretResolver>,
}

impl SecretVersionReconciler {
    /// Creates a reconciler reading versions from `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn SecretResolver>) -> Self {
        Self { resolver }
    }

    /// Returns the version id to record.
    ///
    /// Create and Update look the current version up; Delete echoes the
    /// recorded one without contacting the secret store.
    ///
    /// # Errors
    ///
    /// Returns secret resolution errors, or a configuration error for a
    /// Delete without a recorded version.
    pub async fn reconcile(&self, request: &SecretVersionRequest) -> Result<String> {
        match request.request_type {
            RequestType::Create | RequestType::Update => {
                let version = self.resolver.current_version(&request.secret_id).await?;
                info!(
                    secret_id = %request.secret_id,
                    version = %version,
                    "Resolved secret version"
                );
                Ok(version)
            }
            RequestType::Delete => request
                .prior_version_id
                .clone()
                .ok_or_else(|| SpecError::MissingField("priorVersionId").into()),
        }
    }
}
