//! Admin console operations over the profile store.

use crate::provision::{AccountProvisioner, NewAccount};
use crate::{AdminError, AdminResult};
use chrono::{DateTime, NaiveDate, Utc};
use credential_gateway::{display_username, CredentialGateway, Identity};
use profile_store::{ProfilePatch, ProfileRecord, ProfileStore, Role};
use serde::Serialize;
use session_supervisor::{SessionContext, SupervisorSnapshot};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// One row of the accounts table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRow {
    pub username: String,
    pub id: String,
    pub address: String,
    pub role: Role,
    pub disabled: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub expired: bool,
    pub password_version: u64,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AccountRow {
    pub fn from_record(record: &ProfileRecord, now: DateTime<Utc>) -> Self {
        Self {
            username: display_username(&record.address).to_string(),
            id: record.id.clone(),
            address: record.address.clone(),
            role: record.role,
            disabled: record.is_disabled,
            expiry_date: record.expiry_date,
            expired: record.is_expired_at(now),
            password_version: record.password_version,
            note: record.note.clone(),
            created_at: record.created_at(),
        }
    }

    /// Human-readable status column.
    pub fn status(&self) -> &'static str {
        if self.disabled {
            "disabled"
        } else if self.expired {
            "expired"
        } else {
            "active"
        }
    }
}

impl fmt::Display for AccountRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expiry = self
            .expiry_date
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        write!(
            f,
            "{:<24} {:<7} {:<9} {:<11} {}",
            self.username,
            self.role,
            self.status(),
            expiry,
            self.id
        )
    }
}

/// Case-insensitive match on the address, or a substring of the id.
fn matches_search(record: &ProfileRecord, term: &str) -> bool {
    record.address.to_lowercase().contains(&term.to_lowercase()) || record.id.contains(term)
}

/// Parse an operator-supplied expiry. A bare `YYYY-MM-DD` date means UTC
/// midnight of that day; full RFC 3339 timestamps are taken as given.
pub fn parse_expiry(input: &str) -> AdminResult<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| AdminError::InvalidDate(input.to_string()));
    }
    DateTime::parse_from_rfc3339(input)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| AdminError::InvalidDate(input.to_string()))
}

/// Admin operations, available only to an active admin session.
pub struct AdminConsole {
    operator: Identity,
    store: Arc<dyn ProfileStore>,
    provisioner: AccountProvisioner,
}

impl AdminConsole {
    /// Open the console if `snapshot` is an active admin session.
    pub fn authorize(
        snapshot: &SupervisorSnapshot,
        gateway: Arc<dyn CredentialGateway>,
        store: Arc<dyn ProfileStore>,
    ) -> AdminResult<Self> {
        let operator = match (&snapshot.identity, snapshot.is_admin()) {
            (Some(identity), true) => identity.clone(),
            _ => return Err(AdminError::NotAuthorized),
        };
        Ok(Self {
            operator,
            provisioner: AccountProvisioner::new(gateway, store.clone()),
            store,
        })
    }

    /// Open the console for the session held by `context`.
    pub fn for_session(context: &SessionContext) -> AdminResult<Self> {
        Self::authorize(
            &context.snapshot(),
            context.gateway().clone(),
            context.store().clone(),
        )
    }

    pub fn operator(&self) -> &Identity {
        &self.operator
    }

    /// All accounts, newest first, optionally filtered by `search`.
    pub async fn list(&self, search: Option<&str>) -> AdminResult<Vec<AccountRow>> {
        let now = Utc::now();
        let term = search.map(str::trim).filter(|term| !term.is_empty());
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .filter(|record| term.map_or(true, |term| matches_search(record, term)))
            .map(|record| AccountRow::from_record(record, now))
            .collect())
    }

    pub async fn create_account(&self, account: &NewAccount) -> AdminResult<ProfileRecord> {
        let record = self.provisioner.create_account(account).await?;
        info!(operator = %self.operator.id, user_id = %record.id, "Admin created account");
        Ok(record)
    }

    async fn existing(&self, id: &str) -> AdminResult<ProfileRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(id.to_string()))
    }

    /// Remove the profile record, which revokes access. The identity itself
    /// is left in place.
    pub async fn delete(&self, id: &str) -> AdminResult<()> {
        self.existing(id).await?;
        self.store.delete(id).await?;
        info!(operator = %self.operator.id, user_id = %id, "Admin deleted account");
        Ok(())
    }

    pub async fn set_disabled(&self, id: &str, disabled: bool) -> AdminResult<()> {
        self.store.update(id, &ProfilePatch::disabled(disabled)).await?;
        info!(operator = %self.operator.id, user_id = %id, disabled, "Admin changed account status");
        Ok(())
    }

    /// Flip the disabled flag. Returns the new value.
    pub async fn toggle_disabled(&self, id: &str) -> AdminResult<bool> {
        let disabled = !self.existing(id).await?.is_disabled;
        self.set_disabled(id, disabled).await?;
        Ok(disabled)
    }

    /// Bump the password version so every open session of the account is
    /// evicted. Returns the new version.
    pub async fn force_logout(&self, id: &str) -> AdminResult<u64> {
        let version = self.existing(id).await?.password_version + 1;
        self.store
            .update(id, &ProfilePatch::password_version(version))
            .await?;
        info!(operator = %self.operator.id, user_id = %id, password_version = version, "Admin forced logout");
        Ok(version)
    }

    /// Set or clear (`None`) the membership expiry.
    pub async fn set_expiry(&self, id: &str, expiry: Option<DateTime<Utc>>) -> AdminResult<()> {
        self.store.update(id, &ProfilePatch::expiry(expiry)).await?;
        info!(operator = %self.operator.id, user_id = %id, expiry = ?expiry, "Admin set expiry");
        Ok(())
    }

    /// Set or clear (`None`) the free-form note.
    pub async fn set_note(&self, id: &str, note: Option<String>) -> AdminResult<()> {
        let note = note.filter(|note| !note.trim().is_empty());
        self.store.update(id, &ProfilePatch::note(note)).await?;
        info!(operator = %self.operator.id, user_id = %id, "Admin set note");
        Ok(())
    }
}
