use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated account identity as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque unique id; also the key of the account's profile record.
    pub id: String,
    /// Email-shaped address used for sign-in.
    pub address: String,
    /// When the session for this identity was established. A restored
    /// session keeps its original value.
    pub established_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            established_at: Utc::now(),
        }
    }

    /// Human-facing username (pseudo-domain stripped).
    pub fn username(&self) -> &str {
        crate::display_username(&self.address)
    }
}
