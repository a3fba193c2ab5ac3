//! CLI command implementations.

mod admin;
mod auth;

pub use admin::{
    admin_create, admin_delete, admin_force_logout, admin_list, admin_set_disabled,
    admin_set_expiry, admin_set_note, admin_toggle,
};
pub use auth::{login, logout, status, watch};

use crate::backend::{Backend, BackendKind, DEMO_ADMIN, DEMO_ADMIN_SECRET};
use crate::output::{self, OutputFormat};
use account_admin::AdminConsole;
use anyhow::Result;
use session_supervisor::{SessionContext, SupervisorError, SupervisorSnapshot};
use std::time::Duration;

/// How long to wait for the first profile observation.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the supervisor and wait until it has decided on the current
/// identity.
async fn open_session(backend: &Backend) -> (SessionContext, SupervisorSnapshot) {
    let context = backend.start_session();
    let snapshot = context.settled(SETTLE_TIMEOUT).await;
    (context, snapshot)
}

/// Open an admin console for the stored session.
///
/// The memory backend has no stored session, so the demo admin is signed in.
async fn require_admin(
    backend: &Backend,
    format: &OutputFormat,
) -> Result<(SessionContext, AdminConsole)> {
    let context = backend.start_session();
    if backend.kind == BackendKind::Memory && context.gateway().current_identity().is_none() {
        output::print_notice(
            &format!("Using demo admin \"{}\" (memory backend)", DEMO_ADMIN),
            format,
        );
        context
            .sign_in(DEMO_ADMIN, DEMO_ADMIN_SECRET)
            .await
            .map_err(login_failure)?;
    }

    let snapshot = context.settled(SETTLE_TIMEOUT).await;
    if snapshot.identity.is_none() {
        anyhow::bail!("Not logged in. Run 'render-panel login' first");
    }
    if let Some(message) = snapshot.revocation_message() {
        anyhow::bail!(message);
    }
    if let Some(reason) = &snapshot.subscription_error {
        anyhow::bail!("Your profile could not be verified: {}", reason);
    }

    let console = AdminConsole::for_session(&context)?;
    Ok((context, console))
}

/// Login failures carry their own user-facing message.
fn login_failure(error: SupervisorError) -> anyhow::Error {
    match error.login_message() {
        Some(message) => anyhow::anyhow!(message),
        None => error.into(),
    }
}
