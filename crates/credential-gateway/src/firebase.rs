//! Firebase Identity Toolkit REST client.
//!
//! Implements the gateway contract over `accounts:signInWithPassword` and
//! `accounts:signUp`. The signed-in session can be persisted to a JSON file
//! so that separate CLI invocations share one session.

use crate::{CredentialGateway, GatewayError, GatewayResult, Identity, IsolatedContext};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Tokens and identity of a signed-in Firebase client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirebaseSession {
    pub identity: Identity,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl FirebaseSession {
    /// Whether the id token is past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    /// Seconds, encoded as a string by the API.
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    SignIn,
    SignUp,
}

/// Map an Identity Toolkit error message (e.g. `"WEAK_PASSWORD : Password
/// should be at least 6 characters"`) to a gateway error.
fn map_error_message(operation: Operation, address: &str, message: &str) -> GatewayError {
    let code = message
        .split(|c: char| c == ':' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    match (operation, code) {
        (
            Operation::SignIn,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED"
            | "INVALID_EMAIL",
        ) => GatewayError::InvalidCredential,
        (_, "TOO_MANY_ATTEMPTS_TRY_LATER") => GatewayError::TooManyAttempts,
        (Operation::SignUp, "EMAIL_EXISTS") => GatewayError::AddressTaken(address.to_string()),
        (Operation::SignUp, "WEAK_PASSWORD") => GatewayError::WeakSecret(message.to_string()),
        (Operation::SignUp, "INVALID_EMAIL" | "MISSING_EMAIL") => {
            GatewayError::InvalidAddress(address.to_string())
        }
        _ => GatewayError::Network(format!("identity toolkit rejected request: {}", message)),
    }
}

/// Shared HTTP plumbing for the primary client and isolated contexts.
#[derive(Clone)]
struct ToolkitEndpoint {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ToolkitEndpoint {
    fn url(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.base_url.trim_end_matches('/'),
            method,
            self.api_key
        )
    }

    async fn password_call(
        &self,
        operation: Operation,
        address: &str,
        secret: &str,
    ) -> GatewayResult<FirebaseSession> {
        let method = match operation {
            Operation::SignIn => "signInWithPassword",
            Operation::SignUp => "signUp",
        };

        let response = self
            .http
            .post(self.url(method))
            .json(&PasswordRequest {
                email: address,
                password: secret,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            debug!(method, status = %status, message = %message, "identity toolkit error");
            return Err(map_error_message(operation, address, &message));
        }

        let token: TokenResponse = response.json().await?;
        let expires_in = token
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(3600);
        let now = Utc::now();

        Ok(FirebaseSession {
            identity: Identity {
                id: token.local_id,
                address: token.email.unwrap_or_else(|| address.to_string()),
                established_at: now,
            },
            id_token: token.id_token,
            refresh_token: token.refresh_token,
            expires_at: now + Duration::seconds(expires_in),
        })
    }
}

/// Firebase-backed gateway.
pub struct FirebaseGateway {
    endpoint: ToolkitEndpoint,
    session: RwLock<Option<FirebaseSession>>,
    identity_tx: watch::Sender<Option<Identity>>,
    session_file: Option<PathBuf>,
}

impl FirebaseGateway {
    /// Create a client without session persistence.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let endpoint = ToolkitEndpoint {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        };
        Self::from_endpoint(endpoint, None)
    }

    /// Create a client that restores its session from `path` and writes it
    /// back on every sign-in / sign-out.
    pub fn with_session_file(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> GatewayResult<Self> {
        let gateway = Self::new(base_url, api_key);
        let path = path.into();
        let restored = load_session(&path)?;
        let gateway = Self {
            session_file: Some(path),
            ..gateway
        };
        if let Some(session) = restored {
            if session.is_expired(Utc::now()) {
                info!(user_id = %session.identity.id, "stored session expired, discarding");
                gateway.clear_session();
            } else {
                info!(user_id = %session.identity.id, "restored stored session");
                gateway.install_session(session)?;
            }
        }
        Ok(gateway)
    }

    fn from_endpoint(endpoint: ToolkitEndpoint, session_file: Option<PathBuf>) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            endpoint,
            session: RwLock::new(None),
            identity_tx,
            session_file,
        }
    }

    /// Current id token, used as the bearer for Firestore requests.
    pub fn id_token(&self) -> Option<String> {
        self.session
            .read()
            .as_ref()
            .filter(|session| !session.is_expired(Utc::now()))
            .map(|session| session.id_token.clone())
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Option<FirebaseSession> {
        self.session.read().clone()
    }

    fn install_session(&self, session: FirebaseSession) -> GatewayResult<()> {
        if let Some(path) = &self.session_file {
            save_session(path, &session)?;
        }
        let identity = session.identity.clone();
        *self.session.write() = Some(session);
        self.identity_tx.send_replace(Some(identity));
        Ok(())
    }

    /// Drop the in-memory session, then the stored copy. A stored copy that
    /// cannot be removed is logged; the identity is signed out regardless.
    fn clear_session(&self) -> bool {
        let had_session = self.session.write().take().is_some();
        self.identity_tx
            .send_if_modified(|current| current.take().is_some());

        if let Some(path) = &self.session_file {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove session file");
                }
            }
        }
        had_session
    }
}

fn load_session(path: &Path) -> GatewayResult<Option<FirebaseSession>> {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_session(path: &Path, session: &FirebaseSession) -> GatewayResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(session)?)?;
    Ok(())
}

#[async_trait]
impl CredentialGateway for FirebaseGateway {
    async fn sign_in(&self, address: &str, secret: &str) -> GatewayResult<Identity> {
        let session = self
            .endpoint
            .password_call(Operation::SignIn, address, secret)
            .await?;
        let identity = session.identity.clone();
        info!(user_id = %identity.id, "signed in with identity toolkit");
        self.install_session(session)?;
        Ok(identity)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        if self.clear_session() {
            info!("signed out");
        } else {
            debug!("sign-out with no active session");
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
        debug!("opening isolated identity toolkit context");
        Ok(Box::new(FirebaseIsolatedContext {
            client: FirebaseGateway::from_endpoint(self.endpoint.clone(), None),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Secondary client with its own (unpersisted) session slot.
struct FirebaseIsolatedContext {
    client: FirebaseGateway,
    closed: AtomicBool,
}

impl Drop for FirebaseIsolatedContext {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) && self.client.clear_session() {
            debug!("isolated context dropped with a live session");
        }
    }
}

impl FirebaseIsolatedContext {
    fn ensure_open(&self) -> GatewayResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::ContextClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl IsolatedContext for FirebaseIsolatedContext {
    async fn provision(&self, address: &str, secret: &str) -> GatewayResult<Identity> {
        self.ensure_open()?;
        let session = self
            .client
            .endpoint
            .password_call(Operation::SignUp, address, secret)
            .await?;
        let identity = session.identity.clone();
        info!(user_id = %identity.id, "identity provisioned");
        self.client.install_session(session)?;
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
        self.client.clear_session();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
