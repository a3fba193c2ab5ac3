//! Profile record model.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Password version of a freshly created account.
pub const INITIAL_PASSWORD_VERSION: u64 = 1;

fn initial_password_version() -> u64 {
    INITIAL_PASSWORD_VERSION
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// One account's profile, stored under `users/{id}`.
///
/// Field names on the wire follow the collection's existing documents
/// (`uid`, `email`, `createdAt`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Identity id; also the document key.
    #[serde(rename = "uid")]
    pub id: String,
    /// Sign-in address.
    #[serde(rename = "email")]
    pub address: String,
    pub role: Role,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    /// Bumped by the admin console to force a logout. Only ever increases.
    #[serde(default = "initial_password_version")]
    pub password_version: u64,
    #[serde(default)]
    pub is_disabled: bool,
    /// Absent means the membership never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ProfileRecord {
    /// A fresh, enabled record at the initial password version.
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            role,
            created_at: created_at.timestamp_millis(),
            password_version: INITIAL_PASSWORD_VERSION,
            is_disabled: false,
            expiry_date: None,
            note: None,
        }
    }

    pub fn with_expiry(mut self, expiry_date: Option<DateTime<Utc>>) -> Self {
        self.expiry_date = expiry_date;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Creation time as an instant.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }

    /// True when `now` is strictly after the expiry date.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map_or(false, |expiry| now > expiry)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(version) = patch.password_version {
            self.password_version = version;
        }
        if let Some(disabled) = patch.is_disabled {
            self.is_disabled = disabled;
        }
        if let Some(expiry) = patch.expiry_date {
            self.expiry_date = expiry;
        }
        if let Some(note) = &patch.note {
            self.note = note.clone();
        }
    }
}

/// Partial field update. `None` leaves a field untouched; for the optional
/// fields `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub role: Option<Role>,
    pub password_version: Option<u64>,
    pub is_disabled: Option<bool>,
    pub expiry_date: Option<Option<DateTime<Utc>>>,
    pub note: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn disabled(is_disabled: bool) -> Self {
        Self {
            is_disabled: Some(is_disabled),
            ..Self::default()
        }
    }

    pub fn password_version(version: u64) -> Self {
        Self {
            password_version: Some(version),
            ..Self::default()
        }
    }

    pub fn expiry(expiry_date: Option<DateTime<Utc>>) -> Self {
        Self {
            expiry_date: Some(expiry_date),
            ..Self::default()
        }
    }

    pub fn note(note: Option<String>) -> Self {
        Self {
            note: Some(note),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Wire names of the fields this patch touches.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.role.is_some() {
            paths.push("role");
        }
        if self.password_version.is_some() {
            paths.push("passwordVersion");
        }
        if self.is_disabled.is_some() {
            paths.push("isDisabled");
        }
        if self.expiry_date.is_some() {
            paths.push("expiryDate");
        }
        if self.note.is_some() {
            paths.push("note");
        }
        paths
    }
}
