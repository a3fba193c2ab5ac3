//! Gateway contract.

use crate::{GatewayResult, Identity};
use async_trait::async_trait;
use tokio::sync::watch;

/// Hosted identity service as seen by the panel.
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    /// Sign in with an already-normalized address.
    ///
    /// Fails with `InvalidCredential`, `TooManyAttempts` or a network error.
    /// On success the identity is published on [`identity_changes`].
    ///
    /// [`identity_changes`]: CredentialGateway::identity_changes
    async fn sign_in(&self, address: &str, secret: &str) -> GatewayResult<Identity>;

    /// Sign out the current identity. Safe to call when already signed out.
    async fn sign_out(&self) -> GatewayResult<()>;

    /// Identity currently signed in on this client, if any.
    fn current_identity(&self) -> Option<Identity>;

    /// Live view of the signed-in identity. Dropping the receiver unsubscribes.
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>>;

    /// Open a second, independent client against the same backend so that
    /// provisioning does not replace this client's session.
    async fn create_isolated_context(&self) -> GatewayResult<Box<dyn IsolatedContext>>;
}

/// Short-lived client used to create accounts on behalf of an operator.
#[async_trait]
pub trait IsolatedContext: Send + Sync {
    /// Create an identity. The isolated client ends up signed in as it,
    /// which is why this never runs on the operator's own client.
    ///
    /// Fails with `AddressTaken`, `WeakSecret` or `InvalidAddress`.
    async fn provision(&self, address: &str, secret: &str) -> GatewayResult<Identity>;

    /// Sign out the isolated client.
    async fn sign_out(&self) -> GatewayResult<()>;

    /// Release the context. Idempotent; any later call fails with
    /// `ContextClosed`.
    async fn teardown(&self) -> GatewayResult<()>;

    /// Whether [`teardown`](IsolatedContext::teardown) already ran.
    fn is_closed(&self) -> bool;
}
