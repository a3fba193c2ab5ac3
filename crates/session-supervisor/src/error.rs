//! Supervisor error types.

use credential_gateway::GatewayError;
use profile_store::StoreError;
use thiserror::Error;

/// Supervisor error type.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Sign-in was refused. `message` is safe to show to the user.
    #[error("{message}")]
    Login {
        message: &'static str,
        #[source]
        source: GatewayError,
    },

    /// Gateway error outside of sign-in
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Profile store error
    #[error("Profile store error: {0}")]
    Store(#[from] StoreError),

    /// The state machine refused an input
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// The supervisor task is no longer running
    #[error("Supervisor stopped")]
    Stopped,

    /// IO error (baseline file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (baseline file)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupervisorError {
    /// Wrap a sign-in failure with its user-facing message.
    pub fn login(source: GatewayError) -> Self {
        SupervisorError::Login {
            message: source.login_message(),
            source,
        }
    }

    /// Message suitable for the login surface, if this is a sign-in error.
    pub fn login_message(&self) -> Option<&'static str> {
        match self {
            SupervisorError::Login { message, .. } => Some(*message),
            _ => None,
        }
    }
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_displays_user_message() {
        let err = SupervisorError::login(GatewayError::InvalidCredential);
        assert_eq!(err.to_string(), "Invalid username or password.");
        assert_eq!(err.login_message(), Some("Invalid username or password."));

        let err = SupervisorError::login(GatewayError::Network("down".into()));
        assert_eq!(
            err.to_string(),
            "Failed to log in. Please check your connection."
        );
    }

    #[test]
    fn test_non_login_errors_have_no_login_message() {
        assert!(SupervisorError::Stopped.login_message().is_none());
    }
}
