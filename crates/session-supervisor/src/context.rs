//! Session context owned by the composition root.

use crate::baseline::BaselineStore;
use crate::clock::Clock;
use crate::supervisor::{Supervisor, SupervisorHandle, SupervisorSnapshot};
use crate::{SupervisorError, SupervisorResult, SupervisorState};
use credential_gateway::{to_address, CredentialGateway, GatewayError, Identity};
use profile_store::ProfileStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Gateway, store and the supervisor watching them, bundled for callers.
pub struct SessionContext {
    gateway: Arc<dyn CredentialGateway>,
    store: Arc<dyn ProfileStore>,
    supervisor: SupervisorHandle,
}

impl SessionContext {
    /// Start a supervisor over `gateway` and `store`.
    pub fn start(
        gateway: Arc<dyn CredentialGateway>,
        store: Arc<dyn ProfileStore>,
        baselines: Arc<dyn BaselineStore>,
    ) -> Self {
        let supervisor = Supervisor::new(gateway.clone(), store.clone())
            .with_baselines(baselines)
            .spawn();
        Self::from_parts(gateway, store, supervisor)
    }

    /// Like [`start`](Self::start) with an explicit clock.
    pub fn start_with_clock(
        gateway: Arc<dyn CredentialGateway>,
        store: Arc<dyn ProfileStore>,
        baselines: Arc<dyn BaselineStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let supervisor = Supervisor::new(gateway.clone(), store.clone())
            .with_baselines(baselines)
            .with_clock(clock)
            .spawn();
        Self::from_parts(gateway, store, supervisor)
    }

    pub fn from_parts(
        gateway: Arc<dyn CredentialGateway>,
        store: Arc<dyn ProfileStore>,
        supervisor: SupervisorHandle,
    ) -> Self {
        Self {
            gateway,
            store,
            supervisor,
        }
    }

    /// Sign in with a username or full address.
    ///
    /// Failures carry the message to show on the login surface; unknown
    /// accounts and wrong secrets are indistinguishable.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> SupervisorResult<Identity> {
        if identifier.trim().is_empty() {
            return Err(SupervisorError::login(GatewayError::InvalidCredential));
        }
        let address = to_address(identifier);
        debug!(address = %address, "Signing in");

        let identity = self
            .gateway
            .sign_in(&address, secret)
            .await
            .map_err(SupervisorError::login)?;
        info!(user_id = %identity.id, "Signed in");
        Ok(identity)
    }

    pub async fn sign_out(&self) -> SupervisorResult<()> {
        self.gateway.sign_out().await?;
        Ok(())
    }

    pub fn snapshot(&self) -> SupervisorSnapshot {
        self.supervisor.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorSnapshot> {
        self.supervisor.subscribe()
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot().is_admin()
    }

    pub fn may_render(&self) -> bool {
        self.snapshot().may_render()
    }

    /// Wait until the supervisor has decided on the gateway's current
    /// identity: it has picked that identity up and left `Pending`, or it
    /// evicted it. Returns the latest snapshot on timeout.
    pub async fn settled(&self, timeout: Duration) -> SupervisorSnapshot {
        let expected = self.gateway.current_identity().map(|identity| identity.id);
        let wait = self.supervisor.wait_until(|snapshot| {
            let seen = snapshot.identity.as_ref().map(|identity| &identity.id);
            snapshot.state != SupervisorState::Pending
                && (seen == expected.as_ref() || snapshot.revocation.is_some())
        });
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(snapshot)) => snapshot,
            _ => self.snapshot(),
        }
    }

    /// See [`SupervisorHandle::resubscribe`].
    pub async fn resubscribe(&self) -> SupervisorResult<()> {
        self.supervisor.resubscribe().await
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.supervisor
    }

    pub fn gateway(&self) -> &Arc<dyn CredentialGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Stop the supervisor. The identity stays signed in.
    pub async fn shutdown(self) -> SupervisorResult<()> {
        self.supervisor.shutdown().await
    }
}
