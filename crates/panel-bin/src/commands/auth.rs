//! Authentication commands.

use super::{login_failure, open_session};
use crate::backend::Backend;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::Utc;
use credential_gateway::display_username;
use session_supervisor::{SupervisorSnapshot, SupervisorState};
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Login with a username (or full address) and password.
pub async fn login(backend: &Backend, identifier: Option<String>, format: &OutputFormat) -> Result<()> {
    if let Some(identity) = backend.gateway.current_identity() {
        output::print_success(
            &format!("Already logged in as {}", identity.username()),
            format,
        );
        return Ok(());
    }

    let identifier = match identifier {
        Some(identifier) => identifier,
        None => {
            print!("Username: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if identifier.is_empty() {
        output::print_error("Username is required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    output::print_notice("Logging in...", format);
    let context = backend.start_session();
    if let Err(e) = context.sign_in(&identifier, &password).await {
        output::print_error(&login_failure(e).to_string(), format);
        return Ok(());
    }

    let snapshot = context.settled(super::SETTLE_TIMEOUT).await;
    report_login(&snapshot, format);
    context.shutdown().await?;
    Ok(())
}

/// The sign-in succeeded; say what the supervisor made of the profile.
fn report_login(snapshot: &SupervisorSnapshot, format: &OutputFormat) {
    let username = snapshot
        .identity
        .as_ref()
        .map(|identity| identity.username().to_string())
        .unwrap_or_default();

    if let Some(message) = snapshot.revocation_message() {
        output::print_error(message, format);
        return;
    }
    match snapshot.state {
        SupervisorState::Active => {
            let role = snapshot
                .profile
                .as_ref()
                .map(|profile| profile.role.to_string())
                .unwrap_or_default();
            output::print_success(&format!("Logged in as {} ({})", username, role), format);
        }
        SupervisorState::Unverifiable => {
            let reason = snapshot.subscription_error.as_deref().unwrap_or("unknown error");
            output::print_error(
                &format!(
                    "Logged in as {}, but the membership could not be verified: {}",
                    username, reason
                ),
                format,
            );
        }
        _ => output::print_success(
            &format!("Logged in as {}, membership check still pending", username),
            format,
        ),
    }
}

/// Logout and clear the stored session.
pub async fn logout(backend: &Backend, format: &OutputFormat) -> Result<()> {
    match backend.gateway.current_identity() {
        Some(identity) => {
            backend.gateway.sign_out().await?;
            info!(user_id = %identity.id, "Logged out");
            output::print_success("Logged out successfully", format);
        }
        None => output::print_success("Not logged in", format),
    }
    Ok(())
}

/// Show the session and what the supervisor decided about it.
pub async fn status(backend: &Backend, format: &OutputFormat) -> Result<()> {
    let (context, snapshot) = open_session(backend).await;

    match format {
        OutputFormat::Json => output::print_json(&snapshot),
        OutputFormat::Text => print_status(&snapshot),
    }

    context.shutdown().await?;
    Ok(())
}

fn print_status(snapshot: &SupervisorSnapshot) {
    output::print_heading("Session");
    output::print_row("State", snapshot.state.as_str());
    match &snapshot.identity {
        Some(identity) => {
            output::print_row("User", identity.username());
            output::print_row("ID", &identity.id);
        }
        None => output::print_row("User", "not logged in"),
    }

    if let Some(profile) = &snapshot.profile {
        output::print_row("Role", &profile.role.to_string());
        let expiry = profile
            .expiry_date
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        output::print_row("Expires", &expiry);
        output::print_row("Disabled", if profile.is_disabled { "yes" } else { "no" });
    }
    if let Some(message) = snapshot.revocation_message() {
        output::print_row("Signed out", message);
    }
    if let Some(reason) = &snapshot.subscription_error {
        output::print_row("Unverified", reason);
    }
}

/// Follow the session until it ends or Ctrl-C.
///
/// With `retry`, an unverifiable session re-subscribes after that delay.
pub async fn watch(backend: &Backend, retry: Option<Duration>, format: &OutputFormat) -> Result<()> {
    let (context, initial) = open_session(backend).await;
    if initial.identity.is_none() {
        output::print_error("Not logged in. Run 'render-panel login' first", format);
        context.shutdown().await?;
        return Ok(());
    }

    let mut rx = context.subscribe();
    let mut retry_at: Option<Instant> = None;
    let mut last: Option<SupervisorSnapshot> = None;

    output::print_notice("Watching session (Ctrl-C to stop)", format);
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if last.as_ref().map_or(true, |last| changed(last, &snapshot)) {
            print_transition(&snapshot, format);
        }

        if snapshot.state == SupervisorState::Unauthenticated && last.is_some() {
            break;
        }
        if snapshot.state == SupervisorState::Unverifiable && retry_at.is_none() {
            retry_at = retry.map(|delay| Instant::now() + delay);
        }
        last = Some(snapshot);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
            result = rx.changed() => {
                if result.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                retry_at = None;
                debug!("Re-subscribing to profile");
                context.resubscribe().await?;
            }
        }
    }

    context.shutdown().await?;
    Ok(())
}

fn changed(last: &SupervisorSnapshot, next: &SupervisorSnapshot) -> bool {
    last.state != next.state
        || last.revocation != next.revocation
        || last.subscription_error != next.subscription_error
        || last.profile != next.profile
}

fn print_transition(snapshot: &SupervisorSnapshot, format: &OutputFormat) {
    if let OutputFormat::Json = format {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Error: failed to encode output: {}", e),
        }
        return;
    }

    let user = snapshot
        .identity
        .as_ref()
        .map(|identity| display_username(&identity.address).to_string())
        .unwrap_or_else(|| "-".to_string());
    let detail = snapshot
        .revocation_message()
        .map(str::to_string)
        .or_else(|| snapshot.subscription_error.clone())
        .unwrap_or_default();
    println!(
        "{}  {:<15} {:<20} {}",
        Utc::now().format("%H:%M:%S"),
        snapshot.state,
        user,
        detail
    );
}
