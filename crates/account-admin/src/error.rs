//! Admin error types.

use credential_gateway::{GatewayError, Identity};
use profile_store::StoreError;
use thiserror::Error;

/// Account provisioning error.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The isolated context could not be opened.
    #[error("Failed to open isolated context: {0}")]
    Context(#[source] GatewayError),

    /// The backend refused to create the identity. No record was written.
    #[error("Identity creation failed: {0}")]
    Identity(#[source] GatewayError),

    /// The identity exists but its profile record could not be written.
    /// The two are out of sync until reconciled by hand.
    #[error("Identity {} created but its profile could not be written: {source}", .identity.id)]
    ProfileWriteFailed {
        identity: Identity,
        #[source]
        source: StoreError,
    },
}

impl ProvisionError {
    /// Message shown to the operator.
    pub fn user_message(&self, username: &str) -> String {
        match self {
            ProvisionError::Identity(source) => source.provisioning_message(username),
            ProvisionError::Context(source) => format!("Error creating user: {}", source),
            ProvisionError::ProfileWriteFailed { identity, source } => format!(
                "User \"{}\" was created (id {}) but saving the profile failed: {}. \
                 The account has no access until its profile is written.",
                username, identity.id, source
            ),
        }
    }
}

/// Result type for provisioning.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Admin console error.
#[derive(Error, Debug)]
pub enum AdminError {
    /// The caller's session is not an active admin session.
    #[error("Admin access required")]
    NotAuthorized,

    /// No profile record with this id
    #[error("User not found: {0}")]
    NotFound(String),

    /// An expiry date could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Profile store error
    #[error("Profile store error: {0}")]
    Store(StoreError),

    /// Provisioning error
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl From<StoreError> for AdminError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => AdminError::NotFound(id),
            other => AdminError::Store(other),
        }
    }
}

/// Result type for admin console operations.
pub type AdminResult<T> = Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_admin_not_found() {
        let err: AdminError = StoreError::NotFound("uid-1".into()).into();
        assert!(matches!(err, AdminError::NotFound(id) if id == "uid-1"));

        let err: AdminError = StoreError::PermissionDenied("rules".into()).into();
        assert!(matches!(err, AdminError::Store(_)));
    }

    #[test]
    fn test_provision_messages() {
        let taken = ProvisionError::Identity(GatewayError::AddressTaken("x@render.ai".into()));
        assert_eq!(
            taken.user_message("x"),
            "The ID \"x\" is already taken. Please choose a different one."
        );

        let partial = ProvisionError::ProfileWriteFailed {
            identity: Identity::new("uid-9", "x@render.ai"),
            source: StoreError::PermissionDenied("rules".into()),
        };
        assert!(partial.user_message("x").contains("uid-9"));
    }
}
