//! Profile store error types.

use thiserror::Error;

/// Profile store error type.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An update targeted a record that does not exist.
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// The backend refused the request for the current credentials.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other non-success status from the backend.
    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    /// A stored document could not be mapped onto a profile record.
    #[error("Malformed document: {0}")]
    Codec(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Status { status, .. } => *status >= 500 || *status == 429,
            StoreError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().map_or(false, |status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type for profile store operations.
pub type StoreResult<T> = Result<T, StoreError>;
