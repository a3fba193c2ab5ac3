//! Credential gateway error types.

use thiserror::Error;

const MSG_INVALID_LOGIN: &str = "Invalid username or password.";
const MSG_TOO_MANY_ATTEMPTS: &str = "Too many failed attempts. Please try again later.";
const MSG_LOGIN_NETWORK: &str = "Failed to log in. Please check your connection.";
const MSG_WEAK_SECRET: &str = "Password must be at least 6 characters.";
const MSG_INVALID_ID: &str = "Invalid ID format.";

/// Gateway error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Unknown account or wrong secret. The two are never distinguished.
    #[error("Invalid credentials")]
    InvalidCredential,

    /// The backend is throttling sign-in attempts for this account.
    #[error("Too many attempts, try again later")]
    TooManyAttempts,

    /// Network unavailable or the backend answered with something unusable.
    #[error("Network error: {0}")]
    Network(String),

    /// Provisioning: the address already belongs to an identity.
    #[error("Address already in use: {0}")]
    AddressTaken(String),

    /// Provisioning: the secret does not meet the backend's strength rule.
    #[error("Weak secret: {0}")]
    WeakSecret(String),

    /// Provisioning: the address is not email-shaped.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The isolated context was already torn down.
    #[error("Isolated context is closed")]
    ContextClosed,

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (session file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Returns true if the operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::TooManyAttempts => true,
            GatewayError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().map_or(false, |status| status.is_server_error())
            }
            _ => false,
        }
    }

    /// Message shown on the login surface.
    ///
    /// Unknown users, wrong secrets and malformed identifiers all read the
    /// same so the surface does not leak which accounts exist.
    pub fn login_message(&self) -> &'static str {
        match self {
            GatewayError::InvalidCredential | GatewayError::InvalidAddress(_) => MSG_INVALID_LOGIN,
            GatewayError::TooManyAttempts => MSG_TOO_MANY_ATTEMPTS,
            _ => MSG_LOGIN_NETWORK,
        }
    }

    /// Message shown to the operator when creating an account fails.
    pub fn provisioning_message(&self, username: &str) -> String {
        match self {
            GatewayError::AddressTaken(_) => format!(
                "The ID \"{}\" is already taken. Please choose a different one.",
                username
            ),
            GatewayError::WeakSecret(_) => MSG_WEAK_SECRET.to_string(),
            GatewayError::InvalidAddress(_) => MSG_INVALID_ID.to_string(),
            other => format!("Error creating user: {}", other),
        }
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;
