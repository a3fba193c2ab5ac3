//! Admin commands.
//!
//! Accounts are addressed by id, username or full address.

use super::require_admin;
use crate::backend::Backend;
use crate::output::{self, OutputFormat};
use account_admin::{parse_expiry, AccountRow, AdminConsole, AdminError, NewAccount};
use anyhow::Result;
use credential_gateway::to_address;
use profile_store::Role;
use serde_json::json;

/// Resolve an id, username or address to a profile id.
async fn resolve(console: &AdminConsole, account: &str) -> Result<String> {
    let address = to_address(account);
    let rows = console.list(None).await?;
    rows.into_iter()
        .find(|row| row.id == account || row.address == address)
        .map(|row| row.id)
        .ok_or_else(|| AdminError::NotFound(account.to_string()).into())
}

/// List accounts.
pub async fn admin_list(backend: &Backend, search: Option<&str>, format: &OutputFormat) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let rows = console.list(search).await?;

    match format {
        OutputFormat::Json => output::print_json(&rows),
        OutputFormat::Text => print_rows(&rows),
    }

    context.shutdown().await?;
    Ok(())
}

fn print_rows(rows: &[AccountRow]) {
    if rows.is_empty() {
        println!("No accounts found");
        return;
    }
    println!(
        "{:<24} {:<7} {:<9} {:<11} {}",
        "Username", "Role", "Status", "Expires", "ID"
    );
    output::print_divider();
    for row in rows {
        println!("{}", row);
        if let Some(note) = &row.note {
            println!("{:<24} note: {}", "", note);
        }
    }
}

/// Create an account. Prompts for the password when not given.
pub async fn admin_create(
    backend: &Backend,
    username: &str,
    password: Option<String>,
    role: Role,
    expiry: Option<&str>,
    note: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;

    let expiry = expiry.map(parse_expiry).transpose()?;
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password for new account: ")?,
    };

    let account = NewAccount::member(username, password)
        .with_role(role)
        .with_expiry(expiry)
        .with_note(note);

    match console.create_account(&account).await {
        Ok(record) => match format {
            OutputFormat::Json => output::print_json(&record),
            OutputFormat::Text => {
                output::print_success(&format!("Created {} ({})", record.address, record.id), format)
            }
        },
        Err(AdminError::Provision(e)) => output::print_error(&e.user_message(username), format),
        Err(e) => return Err(e.into()),
    }

    context.shutdown().await?;
    Ok(())
}

/// Delete an account's profile.
pub async fn admin_delete(backend: &Backend, account: &str, yes: bool, format: &OutputFormat) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let id = resolve(&console, account).await?;

    if !yes && !crate::confirm(&format!("Delete account {}?", account)) {
        output::print_notice("Cancelled", format);
        context.shutdown().await?;
        return Ok(());
    }

    console.delete(&id).await?;
    output::print_success(&format!("Deleted {}", account), format);
    context.shutdown().await?;
    Ok(())
}

/// Enable or disable an account.
pub async fn admin_set_disabled(
    backend: &Backend,
    account: &str,
    disabled: bool,
    format: &OutputFormat,
) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let id = resolve(&console, account).await?;

    console.set_disabled(&id, disabled).await?;
    let verb = if disabled { "Disabled" } else { "Enabled" };
    output::print_success(&format!("{} {}", verb, account), format);
    context.shutdown().await?;
    Ok(())
}

/// Flip an account's disabled flag.
pub async fn admin_toggle(backend: &Backend, account: &str, format: &OutputFormat) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let id = resolve(&console, account).await?;

    let disabled = console.toggle_disabled(&id).await?;
    match format {
        OutputFormat::Json => output::print_json(&json!({ "id": id, "disabled": disabled })),
        OutputFormat::Text => {
            let state = if disabled { "disabled" } else { "enabled" };
            println!("{} is now {}", account, state);
        }
    }
    context.shutdown().await?;
    Ok(())
}

/// Sign the account out everywhere.
pub async fn admin_force_logout(backend: &Backend, account: &str, format: &OutputFormat) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let id = resolve(&console, account).await?;

    let version = console.force_logout(&id).await?;
    match format {
        OutputFormat::Json => {
            output::print_json(&json!({ "id": id, "password_version": version }))
        }
        OutputFormat::Text => println!("Signed out {} everywhere (password version {})", account, version),
    }
    context.shutdown().await?;
    Ok(())
}

/// Set or clear the membership expiry.
pub async fn admin_set_expiry(
    backend: &Backend,
    account: &str,
    date: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let id = resolve(&console, account).await?;

    let expiry = date.map(parse_expiry).transpose()?;
    console.set_expiry(&id, expiry).await?;
    let message = match expiry {
        Some(at) => format!("{} expires {}", account, at.format("%Y-%m-%d %H:%M UTC")),
        None => format!("{} no longer expires", account),
    };
    output::print_success(&message, format);
    context.shutdown().await?;
    Ok(())
}

/// Set or clear the note.
pub async fn admin_set_note(
    backend: &Backend,
    account: &str,
    note: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let (context, console) = require_admin(backend, format).await?;
    let id = resolve(&console, account).await?;

    let cleared = note.as_deref().map_or(true, |note| note.trim().is_empty());
    console.set_note(&id, note).await?;
    let message = if cleared {
        format!("Cleared note on {}", account)
    } else {
        format!("Updated note on {}", account)
    };
    output::print_success(&message, format);
    context.shutdown().await?;
    Ok(())
}
