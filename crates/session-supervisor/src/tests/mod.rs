//! Scenario tests for the session supervisor.
//!
//! - `activation.rs` - sign-in, verification and the identifier forms
//! - `eviction.rs`   - every revocation trigger, live and at sign-in
//! - `ordering.rs`   - stale events, identity switches, single subscription
//! - `failures.rs`   - subscription errors, resubscribe, restarts

mod eviction;
mod ordering;

use crate::{
    BaselineStore, Clock, MemoryBaselineStore, SessionContext, SupervisorSnapshot,
    SupervisorState,
};
use chrono::Utc;
use credential_gateway::{AccountDirectory, InMemoryGateway};
use profile_store::{InMemoryProfileStore, ProfileRecord, Role};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SECRET: &str = "hunter22";

const WAIT: Duration = Duration::from_secs(5);

/// In-memory backend plus a running session context.
pub(crate) struct Harness {
    pub gateway: Arc<InMemoryGateway>,
    pub store: InMemoryProfileStore,
    pub context: SessionContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_baselines(Arc::new(MemoryBaselineStore::new()))
    }

    pub fn with_baselines(baselines: Arc<dyn BaselineStore>) -> Self {
        let gateway = Arc::new(InMemoryGateway::new(AccountDirectory::new()));
        let store = InMemoryProfileStore::new();
        let context = SessionContext::start(gateway.clone(), Arc::new(store.clone()), baselines);
        Self {
            gateway,
            store,
            context,
        }
    }

    /// Like [`new`](Self::new) with the supervisor reading `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let gateway = Arc::new(InMemoryGateway::new(AccountDirectory::new()));
        let store = InMemoryProfileStore::new();
        let context = SessionContext::start_with_clock(
            gateway.clone(),
            Arc::new(store.clone()),
            Arc::new(MemoryBaselineStore::new()),
            clock,
        );
        Self {
            gateway,
            store,
            context,
        }
    }

    /// Register an identity and write its profile record.
    pub async fn member(&self, address: &str) -> ProfileRecord {
        self.account(address, Role::Member).await
    }

    pub async fn account(&self, address: &str, role: Role) -> ProfileRecord {
        let record = self.identity_only(address, role);
        profile_store::ProfileStore::set(&self.store, &record)
            .await
            .unwrap();
        record
    }

    /// Register an identity without writing a record. Returns the record
    /// that would belong to it.
    pub fn identity_only(&self, address: &str, role: Role) -> ProfileRecord {
        let id = self.gateway.directory().register(address, SECRET).unwrap();
        ProfileRecord::new(id, address, role, Utc::now())
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SupervisorSnapshot) -> bool,
    ) -> SupervisorSnapshot {
        tokio::time::timeout(WAIT, self.context.supervisor().wait_until(predicate))
            .await
            .expect("timed out waiting for supervisor state")
            .unwrap()
    }

    pub async fn wait_for_state(&self, state: SupervisorState) -> SupervisorSnapshot {
        self.wait_for(|snapshot| snapshot.state == state).await
    }

    /// Wait until an eviction has completed: revoked and signed out.
    pub async fn wait_for_eviction(&self) -> SupervisorSnapshot {
        self.wait_for(|snapshot| {
            snapshot.revocation.is_some() && snapshot.state == SupervisorState::Unauthenticated
        })
        .await
    }

    /// Give the supervisor a chance to act on anything already queued.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn basic_workflow() {
    let harness = Harness::new();
    assert_eq!(harness.context.snapshot().state, SupervisorState::Unauthenticated);

    let record = harness.member("member01@render.ai").await;
    let identity = harness.context.sign_in("member01", SECRET).await.unwrap();
    assert_eq!(identity.id, record.id);

    let snapshot = harness.wait_for_state(SupervisorState::Active).await;
    assert!(snapshot.may_render());
    assert_eq!(snapshot.profile.as_ref(), Some(&record));

    harness.context.sign_out().await.unwrap();
    let snapshot = harness.wait_for_state(SupervisorState::Unauthenticated).await;
    assert!(snapshot.identity.is_none());
    assert!(snapshot.revocation.is_none());

    harness.context.shutdown().await.unwrap();
}
