//! Render panel CLI - membership-gated session and account administration.

mod backend;
mod commands;
mod output;

use backend::{Backend, BackendKind};
use clap::{Parser, Subcommand};
use panel_config::{init_logging, Config, Paths};
use profile_store::Role;
use std::time::Duration;
use tracing::debug;

/// Render panel - sign in, watch session validity and manage accounts.
#[derive(Parser)]
#[command(name = "render-panel")]
#[command(about = "Render panel CLI for members and administrators")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Backend to talk to
    #[arg(long, value_enum, default_value = "firebase", global = true, env = "RENDER_PANEL_BACKEND")]
    backend: BackendKind,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username (or address) and password
    Login {
        /// Username or full address; prompted when omitted
        #[arg(short, long)]
        identifier: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Show session and membership status
    Status,

    /// Follow the session until it ends
    Watch {
        /// Re-subscribe this many seconds after the profile becomes unverifiable
        #[arg(long)]
        retry_secs: Option<u64>,
    },

    /// Manage accounts (admin only)
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// List accounts, newest first
    List {
        /// Filter by address or id
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create an account
    Create {
        /// Username (or full address) of the new account
        #[arg(short, long)]
        username: String,

        /// Initial password; prompted when omitted
        #[arg(short, long)]
        password: Option<String>,

        /// Role (admin or member)
        #[arg(short, long, default_value = "member")]
        role: Role,

        /// Membership expiry (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        expiry: Option<String>,

        /// Free-form note
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Delete an account's profile
    Delete {
        /// Account id, username or address
        account: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Disable an account
    Disable {
        /// Account id, username or address
        account: String,
    },

    /// Enable an account
    Enable {
        /// Account id, username or address
        account: String,
    },

    /// Flip an account between enabled and disabled
    Toggle {
        /// Account id, username or address
        account: String,
    },

    /// Sign an account out of every session
    ForceLogout {
        /// Account id, username or address
        account: String,
    },

    /// Set the membership expiry; clears it when no date is given
    SetExpiry {
        /// Account id, username or address
        account: String,

        /// YYYY-MM-DD or RFC 3339
        date: Option<String>,
    },

    /// Set the note; clears it when no text is given
    SetNote {
        /// Account id, username or address
        account: String,

        text: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, &paths);
    debug!(backend = ?cli.backend, "Starting render-panel");

    let backend = Backend::open(cli.backend, &config, &paths).await?;
    let format = &cli.format;

    match cli.command {
        Commands::Login { identifier } => commands::login(&backend, identifier, format).await,
        Commands::Logout => commands::logout(&backend, format).await,
        Commands::Status => commands::status(&backend, format).await,
        Commands::Watch { retry_secs } => {
            commands::watch(&backend, retry_secs.map(Duration::from_secs), format).await
        }
        Commands::Admin { command } => match command {
            AdminCommands::List { search } => {
                commands::admin_list(&backend, search.as_deref(), format).await
            }
            AdminCommands::Create {
                username,
                password,
                role,
                expiry,
                note,
            } => {
                commands::admin_create(
                    &backend,
                    &username,
                    password,
                    role,
                    expiry.as_deref(),
                    note,
                    format,
                )
                .await
            }
            AdminCommands::Delete { account, yes } => {
                commands::admin_delete(&backend, &account, yes, format).await
            }
            AdminCommands::Disable { account } => {
                commands::admin_set_disabled(&backend, &account, true, format).await
            }
            AdminCommands::Enable { account } => {
                commands::admin_set_disabled(&backend, &account, false, format).await
            }
            AdminCommands::Toggle { account } => {
                commands::admin_toggle(&backend, &account, format).await
            }
            AdminCommands::ForceLogout { account } => {
                commands::admin_force_logout(&backend, &account, format).await
            }
            AdminCommands::SetExpiry { account, date } => {
                commands::admin_set_expiry(&backend, &account, date.as_deref(), format).await
            }
            AdminCommands::SetNote { account, text } => {
                commands::admin_set_note(&backend, &account, text, format).await
            }
        },
    }
}

/// Prompt for confirmation.
fn confirm(prompt: &str) -> bool {
    use std::io::{self, Write};

    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
