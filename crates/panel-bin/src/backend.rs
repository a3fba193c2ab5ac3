//! Backend wiring.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::ValueEnum;
use credential_gateway::{to_address, AccountDirectory, CredentialGateway, FirebaseGateway, InMemoryGateway};
use panel_config::{Config, Paths};
use profile_store::{
    BearerToken, FirestoreProfileStore, InMemoryProfileStore, ProfileRecord, ProfileStore, Role,
};
use session_supervisor::{BaselineStore, FileBaselineStore, MemoryBaselineStore, SessionContext};
use std::sync::Arc;
use tracing::{debug, info};

/// Username of the seeded demo admin (memory backend).
pub const DEMO_ADMIN: &str = "admin";
pub const DEMO_ADMIN_SECRET: &str = "render-admin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Firebase Identity Toolkit and Firestore
    #[default]
    Firebase,
    /// In-process demo data, discarded on exit
    Memory,
}

pub struct Backend {
    pub kind: BackendKind,
    pub gateway: Arc<dyn CredentialGateway>,
    pub store: Arc<dyn ProfileStore>,
    pub baselines: Arc<dyn BaselineStore>,
}

impl Backend {
    pub async fn open(kind: BackendKind, config: &Config, paths: &Paths) -> Result<Self> {
        match kind {
            BackendKind::Firebase => Self::firebase(config, paths),
            BackendKind::Memory => Self::memory().await,
        }
    }

    fn firebase(config: &Config, paths: &Paths) -> Result<Self> {
        if config.firebase_api_key.is_empty() || config.firebase_project_id.is_empty() {
            anyhow::bail!(
                "Firebase is not configured. Set firebase_api_key and firebase_project_id in {} \
                 or use --backend memory",
                paths.config_file().display()
            );
        }
        paths.ensure_dirs()?;

        let gateway = Arc::new(
            FirebaseGateway::with_session_file(
                config.identity_toolkit_url()?.as_str(),
                config.firebase_api_key.clone(),
                paths.session_file(),
            )
            .context("Failed to restore session")?,
        );

        let token_source = gateway.clone();
        let token: BearerToken = Arc::new(move || token_source.id_token());
        let store = FirestoreProfileStore::new(
            config.firestore_url()?.as_str(),
            config.firebase_project_id.clone(),
            token,
            config.profile_poll_interval(),
        );
        let baselines = FileBaselineStore::open(paths.baselines_file())
            .context("Failed to open session baselines")?;

        debug!(project = %config.firebase_project_id, "Using Firebase backend");
        Ok(Self {
            kind: BackendKind::Firebase,
            gateway,
            store: Arc::new(store),
            baselines: Arc::new(baselines),
        })
    }

    /// Demo backend: one admin, one member and one expired member.
    async fn memory() -> Result<Self> {
        let directory = AccountDirectory::new();
        let store = InMemoryProfileStore::new();
        let now = Utc::now();

        let seed: [(&str, &str, Role, Option<chrono::DateTime<Utc>>); 3] = [
            (DEMO_ADMIN, DEMO_ADMIN_SECRET, Role::Admin, None),
            ("member01", "member-pass", Role::Member, Some(now + Duration::days(30))),
            ("expired01", "member-pass", Role::Member, Some(now - Duration::days(1))),
        ];
        for (username, secret, role, expiry) in seed {
            let address = to_address(username);
            let id = directory.register(&address, secret)?;
            let record = ProfileRecord::new(id, address, role, now).with_expiry(expiry);
            store.set(&record).await?;
        }
        info!(accounts = store.len(), "Seeded demo backend");

        Ok(Self {
            kind: BackendKind::Memory,
            gateway: Arc::new(InMemoryGateway::new(directory)),
            store: Arc::new(store),
            baselines: Arc::new(MemoryBaselineStore::new()),
        })
    }

    /// Start a session context over this backend.
    pub fn start_session(&self) -> SessionContext {
        SessionContext::start(
            self.gateway.clone(),
            self.store.clone(),
            self.baselines.clone(),
        )
    }
}
