//! Account provisioning.
//!
//! Creating an identity signs the creating client in as that identity. To
//! keep the operator signed in, the identity is created on an isolated
//! gateway context which is signed out and torn down afterwards, whether
//! provisioning succeeded or not.

use crate::{ProvisionError, ProvisionResult};
use chrono::{DateTime, Utc};
use credential_gateway::{to_address, CredentialGateway, GatewayError, IsolatedContext};
use profile_store::{ProfileRecord, ProfileStore, Role};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Details of an account to create.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Username or full address.
    pub username: String,
    pub secret: String,
    pub role: Role,
    pub expiry: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl NewAccount {
    pub fn member(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            role: Role::Member,
            expiry: None,
            note: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_expiry(mut self, expiry: Option<DateTime<Utc>>) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

pub struct AccountProvisioner {
    gateway: Arc<dyn CredentialGateway>,
    store: Arc<dyn ProfileStore>,
}

impl AccountProvisioner {
    pub fn new(gateway: Arc<dyn CredentialGateway>, store: Arc<dyn ProfileStore>) -> Self {
        Self { gateway, store }
    }

    /// Create the identity and its profile record.
    pub async fn create_account(&self, account: &NewAccount) -> ProvisionResult<ProfileRecord> {
        let username = account.username.trim();
        if username.is_empty() {
            return Err(ProvisionError::Identity(GatewayError::InvalidAddress(
                account.username.clone(),
            )));
        }
        let address = to_address(username);

        let context = self
            .gateway
            .create_isolated_context()
            .await
            .map_err(ProvisionError::Context)?;

        let result = self.provision_in(context.as_ref(), &address, account).await;

        if let Err(e) = context.sign_out().await {
            warn!(error = %e, "Isolated context sign-out failed");
        }
        if let Err(e) = context.teardown().await {
            warn!(error = %e, "Isolated context teardown failed");
        }
        debug!(address = %address, "Isolated context released");

        result
    }

    async fn provision_in(
        &self,
        context: &dyn IsolatedContext,
        address: &str,
        account: &NewAccount,
    ) -> ProvisionResult<ProfileRecord> {
        let identity = context
            .provision(address, &account.secret)
            .await
            .map_err(ProvisionError::Identity)?;

        let record = ProfileRecord::new(&identity.id, &identity.address, account.role, Utc::now())
            .with_expiry(account.expiry)
            .with_note(account.note.clone().filter(|note| !note.trim().is_empty()));

        if let Err(source) = self.store.set(&record).await {
            error!(
                user_id = %identity.id,
                error = %source,
                "Identity created but profile write failed"
            );
            return Err(ProvisionError::ProfileWriteFailed { identity, source });
        }

        info!(user_id = %record.id, role = %record.role, "Account created");
        Ok(record)
    }
}
