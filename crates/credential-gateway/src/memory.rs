//! In-memory gateway.
//!
//! `AccountDirectory` plays the hosted backend: every `InMemoryGateway`
//! created over the same directory is an independent client with its own
//! session slot, exactly like two SDK app instances against one project.

use crate::normalize::validate_address;
use crate::{CredentialGateway, GatewayError, GatewayResult, Identity, IsolatedContext};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Minimum secret length accepted when provisioning.
pub const MIN_SECRET_LEN: usize = 6;

/// Consecutive failed sign-ins after which an address is throttled.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct StoredAccount {
    id: String,
    address: String,
    secret: String,
    failed_attempts: u32,
}

#[derive(Debug, Default)]
struct DirectoryState {
    /// Keyed by lowercased address.
    accounts: HashMap<String, StoredAccount>,
    /// Client id -> identity id signed in on that client.
    live_sessions: HashMap<u64, String>,
    next_client_id: u64,
    open_isolated_contexts: usize,
}

/// Shared account backend for in-memory gateways.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account directly, bypassing any client. Returns its id.
    pub fn register(&self, address: &str, secret: &str) -> GatewayResult<String> {
        validate_address(address)?;
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(GatewayError::WeakSecret(format!(
                "Password should be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        let mut state = self.state.lock();
        let key = address.to_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(GatewayError::AddressTaken(address.to_string()));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        state.accounts.insert(
            key.clone(),
            StoredAccount {
                id: id.clone(),
                address: key,
                secret: secret.to_string(),
                failed_attempts: 0,
            },
        );
        Ok(id)
    }

    /// Number of accounts known to the backend.
    pub fn account_count(&self) -> usize {
        self.state.lock().accounts.len()
    }

    /// Whether an identity exists for `address`.
    pub fn contains(&self, address: &str) -> bool {
        self.state
            .lock()
            .accounts
            .contains_key(&address.to_lowercase())
    }

    /// Number of clients currently holding a signed-in identity.
    pub fn active_session_count(&self) -> usize {
        self.state.lock().live_sessions.len()
    }

    /// Number of isolated contexts that have not been torn down.
    pub fn open_isolated_contexts(&self) -> usize {
        self.state.lock().open_isolated_contexts
    }

    fn allocate_client(&self) -> u64 {
        let mut state = self.state.lock();
        state.next_client_id += 1;
        state.next_client_id
    }

    fn authenticate(&self, address: &str, secret: &str) -> GatewayResult<Identity> {
        let mut state = self.state.lock();
        let Some(account) = state.accounts.get_mut(&address.to_lowercase()) else {
            return Err(GatewayError::InvalidCredential);
        };

        if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
            return Err(GatewayError::TooManyAttempts);
        }
        if account.secret != secret {
            account.failed_attempts += 1;
            return Err(GatewayError::InvalidCredential);
        }

        account.failed_attempts = 0;
        Ok(Identity {
            id: account.id.clone(),
            address: account.address.clone(),
            established_at: Utc::now(),
        })
    }

    fn attach_session(&self, client_id: u64, identity_id: &str) {
        self.state
            .lock()
            .live_sessions
            .insert(client_id, identity_id.to_string());
    }

    fn detach_session(&self, client_id: u64) {
        self.state.lock().live_sessions.remove(&client_id);
    }

    fn context_opened(&self) {
        self.state.lock().open_isolated_contexts += 1;
    }

    fn context_closed(&self) {
        let mut state = self.state.lock();
        state.open_isolated_contexts = state.open_isolated_contexts.saturating_sub(1);
    }
}

/// One client of an [`AccountDirectory`].
pub struct InMemoryGateway {
    directory: AccountDirectory,
    client_id: u64,
    identity_tx: watch::Sender<Option<Identity>>,
    sign_out_calls: AtomicUsize,
}

impl InMemoryGateway {
    pub fn new(directory: AccountDirectory) -> Self {
        let client_id = directory.allocate_client();
        let (identity_tx, _) = watch::channel(None);
        Self {
            directory,
            client_id,
            identity_tx,
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// The backend this client talks to.
    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// How many times `sign_out` was invoked on this client.
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn publish(&self, identity: Identity) {
        self.directory.attach_session(self.client_id, &identity.id);
        self.identity_tx.send_replace(Some(identity));
    }

    fn clear(&self) -> bool {
        self.directory.detach_session(self.client_id);
        self.identity_tx.send_if_modified(|current| current.take().is_some())
    }
}

impl Drop for InMemoryGateway {
    fn drop(&mut self) {
        self.directory.detach_session(self.client_id);
    }
}

#[async_trait]
impl CredentialGateway for InMemoryGateway {
    async fn sign_in(&self, address: &str, secret: &str) -> GatewayResult<Identity> {
        let identity = self.directory.authenticate(address, secret)?;
        info!(user_id = %identity.id, client = self.client_id, "signed in");
        self.publish(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.clear() {
            info!(client = self.client_id, "signed out");
        } else {
            debug!(client = self.client_id, "sign-out with no active identity");
        }
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    async fn create_isolated_context(&self) -> GatewayResult<Box<dyn IsolatedContext>> {
        Ok(Box::new(InMemoryIsolatedContext::open(
            self.directory.clone(),
        )))
    }
}

/// Isolated client over the same directory.
struct InMemoryIsolatedContext {
    client: InMemoryGateway,
    closed: AtomicBool,
}

impl InMemoryIsolatedContext {
    fn open(directory: AccountDirectory) -> Self {
        directory.context_opened();
        let client = InMemoryGateway::new(directory);
        debug!(client = client.client_id, "isolated context opened");
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> GatewayResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::ContextClosed);
        }
        Ok(())
    }
}

impl Drop for InMemoryIsolatedContext {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.client.directory.context_closed();
        }
    }
}

#[async_trait]
impl IsolatedContext for InMemoryIsolatedContext {
    async fn provision(&self, address: &str, secret: &str) -> GatewayResult<Identity> {
        self.ensure_open()?;
        let id = self.client.directory.register(address, secret)?;
        let identity = Identity {
            id,
            address: address.to_lowercase(),
            established_at: Utc::now(),
        };
        info!(user_id = %identity.id, "identity provisioned");
        self.client.publish(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.ensure_open()?;
        self.client.sign_out().await
    }

    async fn teardown(&self) -> GatewayResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.clear();
        self.client.directory.context_closed();
        debug!(client = self.client.client_id, "isolated context torn down");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_with_member() -> (AccountDirectory, String) {
        let directory = AccountDirectory::new();
        let id = directory
            .register("member01@render.ai", "secret-123")
            .unwrap();
        (directory, id)
    }

    #[tokio::test]
    async fn test_sign_in_publishes_identity() {
        let (directory, id) = directory_with_member();
        let gateway = InMemoryGateway::new(directory.clone());
        let mut changes = gateway.identity_changes();

        let identity = gateway
            .sign_in("member01@render.ai", "secret-123")
            .await
            .unwrap();
        assert_eq!(identity.id, id);

        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().as_ref().map(|i| i.id.clone()), Some(id));
        assert_eq!(directory.active_session_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_secret_are_indistinguishable() {
        let (directory, _) = directory_with_member();
        let gateway = InMemoryGateway::new(directory);

        let unknown = gateway.sign_in("ghost@render.ai", "secret-123").await;
        let wrong = gateway.sign_in("member01@render.ai", "nope-nope").await;
        assert!(matches!(unknown, Err(GatewayError::InvalidCredential)));
        assert!(matches!(wrong, Err(GatewayError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_repeated_failures_are_throttled() {
        let (directory, _) = directory_with_member();
        let gateway = InMemoryGateway::new(directory);

        for _ in 0..MAX_FAILED_ATTEMPTS {
            let _ = gateway.sign_in("member01@render.ai", "wrong-secret").await;
        }
        let result = gateway.sign_in("member01@render.ai", "secret-123").await;
        assert!(matches!(result, Err(GatewayError::TooManyAttempts)));
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let (directory, _) = directory_with_member();
        let gateway = InMemoryGateway::new(directory.clone());
        gateway
            .sign_in("member01@render.ai", "secret-123")
            .await
            .unwrap();

        gateway.sign_out().await.unwrap();
        gateway.sign_out().await.unwrap();

        assert_eq!(gateway.sign_out_calls(), 2);
        assert!(gateway.current_identity().is_none());
        assert_eq!(directory.active_session_count(), 0);
    }

    #[tokio::test]
    async fn test_isolated_context_does_not_touch_operator_session() {
        let directory = AccountDirectory::new();
        directory.register("admin@render.ai", "admin-secret").unwrap();
        let operator = InMemoryGateway::new(directory.clone());
        let admin = operator
            .sign_in("admin@render.ai", "admin-secret")
            .await
            .unwrap();

        let context = operator.create_isolated_context().await.unwrap();
        let created = context
            .provision("member02@render.ai", "secret-456")
            .await
            .unwrap();
        assert_ne!(created.id, admin.id);
        assert_eq!(operator.current_identity(), Some(admin));
        assert_eq!(directory.active_session_count(), 2);

        context.sign_out().await.unwrap();
        context.teardown().await.unwrap();
        assert!(context.is_closed());
        assert_eq!(directory.active_session_count(), 1);
        assert_eq!(directory.open_isolated_contexts(), 0);
    }

    #[tokio::test]
    async fn test_provision_rejections() {
        let (directory, _) = directory_with_member();
        let operator = InMemoryGateway::new(directory);
        let context = operator.create_isolated_context().await.unwrap();

        assert!(matches!(
            context.provision("member01@render.ai", "secret-123").await,
            Err(GatewayError::AddressTaken(_))
        ));
        assert!(matches!(
            context.provision("fresh@render.ai", "12345").await,
            Err(GatewayError::WeakSecret(_))
        ));
        assert!(matches!(
            context.provision("bad id@render.ai", "secret-123").await,
            Err(GatewayError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_context_rejects_calls_and_drop_releases() {
        let directory = AccountDirectory::new();
        let operator = InMemoryGateway::new(directory.clone());

        let context = operator.create_isolated_context().await.unwrap();
        context.teardown().await.unwrap();
        context.teardown().await.unwrap();
        assert!(matches!(
            context.provision("x@render.ai", "secret-123").await,
            Err(GatewayError::ContextClosed)
        ));
        assert_eq!(directory.open_isolated_contexts(), 0);

        let leaked = operator.create_isolated_context().await.unwrap();
        assert_eq!(directory.open_isolated_contexts(), 1);
        drop(leaked);
        assert_eq!(directory.open_isolated_contexts(), 0);
    }
}
