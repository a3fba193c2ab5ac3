//! Session validity supervisor.
//!
//! A single task follows the gateway's signed-in identity, keeps one live
//! subscription to that identity's profile record and evicts the session
//! (gateway sign-out) as soon as the record stops granting access. All
//! inputs are applied in delivery order by that task; consumers observe the
//! outcome through a `watch` channel of [`SupervisorSnapshot`]s.

use crate::baseline::{BaselineStore, MemoryBaselineStore, SessionBaseline};
use crate::clock::{Clock, SystemClock};
use crate::fsm::{SupervisorInput, SupervisorMachine, SupervisorState};
use crate::verdict::{evaluate, RevocationReason, Verdict};
use crate::{SupervisorError, SupervisorResult};
use credential_gateway::{CredentialGateway, Identity};
use profile_store::{
    ProfileEvent, ProfileRecord, ProfileStore, ProfileSubscription, Role, INITIAL_PASSWORD_VERSION,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Longest single wait on an expiry timer. Longer expiries re-arm.
const MAX_EXPIRY_TIMER: Duration = Duration::from_secs(24 * 60 * 60);

/// Added to expiry timers so they fire strictly after the expiry instant.
const EXPIRY_TIMER_SLACK: Duration = Duration::from_millis(1);

const COMMAND_BUFFER: usize = 16;

/// Everything a consumer needs to decide what to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorSnapshot {
    pub state: SupervisorState,
    pub identity: Option<Identity>,
    /// The current record; only set while `Active`.
    pub profile: Option<ProfileRecord>,
    /// Why the last session was evicted. Kept until a new identity signs in.
    pub revocation: Option<RevocationReason>,
    /// Why the profile cannot be verified. Only set while `Unverifiable`.
    pub subscription_error: Option<String>,
}

impl SupervisorSnapshot {
    pub fn unauthenticated() -> Self {
        Self {
            state: SupervisorState::Unauthenticated,
            identity: None,
            profile: None,
            revocation: None,
            subscription_error: None,
        }
    }

    /// Gated content may only be shown in this state.
    pub fn may_render(&self) -> bool {
        self.state == SupervisorState::Active && self.profile.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.may_render()
            && self
                .profile
                .as_ref()
                .map_or(false, |profile| profile.role == Role::Admin)
    }

    pub fn revocation_message(&self) -> Option<&'static str> {
        self.revocation.as_ref().map(RevocationReason::user_message)
    }
}

#[derive(Debug)]
enum SupervisorCommand {
    Resubscribe,
    Shutdown,
}

/// Supervisor configuration; [`spawn`](Supervisor::spawn) starts it.
pub struct Supervisor {
    gateway: Arc<dyn CredentialGateway>,
    store: Arc<dyn ProfileStore>,
    baselines: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
}

impl Supervisor {
    /// Supervisor with in-memory baselines and the system clock.
    pub fn new(gateway: Arc<dyn CredentialGateway>, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            gateway,
            store,
            baselines: Arc::new(MemoryBaselineStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_baselines(mut self, baselines: Arc<dyn BaselineStore>) -> Self {
        self.baselines = baselines;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start the supervisor task. Must be called within a tokio runtime.
    pub fn spawn(self) -> SupervisorHandle {
        let identities = self.gateway.identity_changes();
        let (snapshot_tx, snapshots) = watch::channel(SupervisorSnapshot::unauthenticated());
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);

        let runtime = Runtime {
            gateway: self.gateway,
            store: self.store,
            baselines: self.baselines,
            clock: self.clock,
            machine: SupervisorMachine::new(),
            identity: None,
            subscription: None,
            profile: None,
            baseline: None,
            revocation: None,
            subscription_error: None,
            expiry_deadline: None,
            snapshot_tx,
        };
        let task = tokio::spawn(runtime.run(identities, commands));

        SupervisorHandle {
            snapshots,
            commands: command_tx,
            task,
        }
    }
}

/// Handle to a running supervisor. Dropping it stops the supervisor.
pub struct SupervisorHandle {
    snapshots: watch::Receiver<SupervisorSnapshot>,
    commands: mpsc::Sender<SupervisorCommand>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Latest published snapshot.
    pub fn snapshot(&self) -> SupervisorSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Intermediate snapshots may be skipped; only the latest one is
    /// guaranteed to be observed.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&SupervisorSnapshot) -> bool,
    ) -> SupervisorResult<SupervisorSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| SupervisorError::Stopped)?;
        Ok(snapshot.clone())
    }

    /// Open a fresh subscription for the current identity after the
    /// previous one failed. Ignored in any state but `Unverifiable`.
    pub async fn resubscribe(&self) -> SupervisorResult<()> {
        self.commands
            .send(SupervisorCommand::Resubscribe)
            .await
            .map_err(|_| SupervisorError::Stopped)
    }

    /// Stop the supervisor and wait for its task to finish. The signed-in
    /// identity is left alone.
    pub async fn shutdown(self) -> SupervisorResult<()> {
        // A closed channel means the task already ended
        let _ = self.commands.send(SupervisorCommand::Shutdown).await;
        self.task.await.map_err(|e| {
            error!(error = %e, "Supervisor task failed");
            SupervisorError::Stopped
        })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

struct Runtime {
    gateway: Arc<dyn CredentialGateway>,
    store: Arc<dyn ProfileStore>,
    baselines: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
    machine: SupervisorMachine,
    identity: Option<Identity>,
    subscription: Option<ProfileSubscription>,
    profile: Option<ProfileRecord>,
    baseline: Option<SessionBaseline>,
    revocation: Option<RevocationReason>,
    subscription_error: Option<String>,
    expiry_deadline: Option<Instant>,
    snapshot_tx: watch::Sender<SupervisorSnapshot>,
}

impl Runtime {
    async fn run(
        mut self,
        mut identities: watch::Receiver<Option<Identity>>,
        mut commands: mpsc::Receiver<SupervisorCommand>,
    ) {
        let initial = identities.borrow_and_update().clone();
        self.on_identity(initial).await;

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(SupervisorCommand::Resubscribe) => self.on_resubscribe().await,
                    Some(SupervisorCommand::Shutdown) | None => break,
                },
                changed = identities.changed() => {
                    if changed.is_err() {
                        warn!("Identity source closed");
                        break;
                    }
                    let identity = identities.borrow_and_update().clone();
                    self.on_identity(identity).await;
                }
                event = next_event(&mut self.subscription) => self.on_event(event).await,
                _ = sleep_until(self.expiry_deadline) => self.on_expiry_timer().await,
            }
        }

        self.close_subscription();
        debug!("Supervisor stopped");
    }

    fn state(&self) -> SupervisorState {
        SupervisorState::from(self.machine.state())
    }

    fn transition(&mut self, input: SupervisorInput) -> bool {
        let old_state = self.state();
        match self.machine.consume(&input) {
            Ok(_) => {
                let new_state = self.state();
                if old_state != new_state {
                    info!(from = %old_state, to = %new_state, "Supervisor state changed");
                }
                true
            }
            Err(_) => {
                warn!(input = ?input, state = %old_state, "Rejected supervisor input");
                false
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SupervisorSnapshot {
            state: self.state(),
            identity: self.identity.clone(),
            profile: self.profile.clone(),
            revocation: self.revocation.clone(),
            subscription_error: self.subscription_error.clone(),
        });
    }

    fn close_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(profile_id = %subscription.id(), "Closing profile subscription");
        }
        self.expiry_deadline = None;
    }

    async fn on_identity(&mut self, next: Option<Identity>) {
        let Some(identity) = next else {
            if self.identity.is_none() && self.state() == SupervisorState::Unauthenticated {
                return;
            }
            self.close_subscription();
            if let Some(previous) = self.identity.take() {
                info!(user_id = %previous.id, "Identity signed out");
            }
            self.profile = None;
            self.baseline = None;
            self.subscription_error = None;
            self.transition(SupervisorInput::IdentityCleared);
            self.publish();
            return;
        };

        if self.identity.as_ref() == Some(&identity)
            && self.state() != SupervisorState::Unauthenticated
        {
            debug!(user_id = %identity.id, "Identity unchanged");
            return;
        }

        // Never two live subscriptions: the old one goes first
        self.close_subscription();
        self.profile = None;
        self.revocation = None;
        self.subscription_error = None;
        self.baseline = match self.baselines.load_for(&identity) {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "Failed to load session baseline");
                None
            }
        };

        info!(user_id = %identity.id, "Watching profile for identity");
        self.identity = Some(identity);
        self.transition(SupervisorInput::IdentityAcquired);
        self.publish();
        self.open_subscription().await;
    }

    async fn open_subscription(&mut self) {
        let Some(id) = self.identity.as_ref().map(|identity| identity.id.clone()) else {
            return;
        };
        match self.store.subscribe(&id).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => self.stream_failed(e.to_string()),
        }
    }

    async fn on_event(&mut self, event: Option<ProfileEvent>) {
        let Some(event) = event else {
            self.subscription = None;
            if self.state().is_watching() {
                self.stream_failed("profile subscription closed".to_string());
            }
            return;
        };

        if !self.state().is_watching() {
            debug!(state = %self.state(), "Ignoring stale profile event");
            return;
        }

        match event {
            ProfileEvent::Present(record) => self.on_record(Some(record)).await,
            ProfileEvent::Absent => self.on_record(None).await,
            ProfileEvent::Error(message) => self.stream_failed(message),
        }
    }

    async fn on_record(&mut self, record: Option<ProfileRecord>) {
        let Some(identity) = self.identity.clone() else {
            return;
        };

        let baseline_version = match (&self.baseline, &record) {
            (Some(baseline), _) => baseline.password_version,
            (None, Some(record)) => {
                let baseline = SessionBaseline::new(&identity, record.password_version);
                if let Err(e) = self.baselines.save(&baseline) {
                    warn!(user_id = %identity.id, error = %e, "Failed to persist session baseline");
                }
                debug!(
                    user_id = %identity.id,
                    password_version = baseline.password_version,
                    "Session baseline established"
                );
                self.baseline = Some(baseline);
                record.password_version
            }
            (None, None) => INITIAL_PASSWORD_VERSION,
        };

        match evaluate(record.as_ref(), baseline_version, self.clock.now()) {
            Verdict::Valid => {
                let was_active = self.state() == SupervisorState::Active;
                if !self.transition(SupervisorInput::ProfileValid) {
                    return;
                }
                if !was_active {
                    info!(user_id = %identity.id, "Session verified");
                }
                self.arm_expiry_timer(record.as_ref());
                self.profile = record;
                self.publish();
            }
            Verdict::Revoked(reason) => self.evict(&identity, reason).await,
        }
    }

    async fn evict(&mut self, identity: &Identity, reason: RevocationReason) {
        self.close_subscription();
        if !self.transition(SupervisorInput::ProfileRevoked) {
            return;
        }
        warn!(user_id = %identity.id, reason = %reason, "Session revoked, signing out");

        self.profile = None;
        self.baseline = None;
        if let Err(e) = self.baselines.remove(&identity.id) {
            warn!(user_id = %identity.id, error = %e, "Failed to drop session baseline");
        }
        self.revocation = Some(reason);
        self.publish();

        if let Err(e) = self.gateway.sign_out().await {
            error!(user_id = %identity.id, error = %e, "Sign-out after revocation failed");
        }
    }

    fn stream_failed(&mut self, message: String) {
        self.close_subscription();
        let user_id = self
            .identity
            .as_ref()
            .map(|identity| identity.id.as_str())
            .unwrap_or_default();
        warn!(user_id = %user_id, error = %message, "Profile subscription failed, session unverifiable");

        if !self.transition(SupervisorInput::StreamFailed) {
            return;
        }
        self.profile = None;
        self.subscription_error = Some(message);
        self.publish();
    }

    async fn on_expiry_timer(&mut self) {
        self.expiry_deadline = None;
        if self.state() != SupervisorState::Active {
            return;
        }
        debug!("Expiry timer fired, re-evaluating profile");
        let record = self.profile.clone();
        self.on_record(record).await;
    }

    async fn on_resubscribe(&mut self) {
        if self.state() != SupervisorState::Unverifiable {
            debug!(state = %self.state(), "Resubscribe ignored");
            return;
        }
        let Some(identity) = self.identity.clone() else {
            return;
        };

        info!(user_id = %identity.id, "Resubscribing to profile");
        self.subscription_error = None;
        self.transition(SupervisorInput::IdentityAcquired);
        self.publish();
        self.open_subscription().await;
    }

    fn arm_expiry_timer(&mut self, record: Option<&ProfileRecord>) {
        self.expiry_deadline = record.and_then(|record| record.expiry_date).map(|at| {
            let remaining = (at - self.clock.now()).to_std().unwrap_or_default();
            Instant::now() + remaining.min(MAX_EXPIRY_TIMER) + EXPIRY_TIMER_SLACK
        });
    }
}

async fn next_event(subscription: &mut Option<ProfileSubscription>) -> Option<ProfileEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
