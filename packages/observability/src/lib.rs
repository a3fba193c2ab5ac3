//! # Observability
//!
//! Centralized tracing setup for the Render panel workspace.
//!
//! Crates in this workspace only emit events through the standard `tracing`
//! macros. The binary calls [`init`] or [`init_with_config`] once at startup
//! and decides where the events go:
//!
//! - with a `log_path`, every event is appended as one JSON object per line
//!   (`~/.render-panel/logs/panel.jsonl` by default) and optionally mirrored
//!   to stderr;
//! - without one, events are written to stderr in the compact format.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "render-panel".into(),
//!     default_level: "debug".into(),
//!     log_path: Some(observability::default_log_path()),
//!     ..Default::default()
//! });
//! tracing::info!("panel started");
//! ```

mod file_sink;
mod json_layer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_sink::{JsonlFileWriter, JsonlWriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSONL entry.
    pub service_name: String,

    /// Default filter directive (e.g. "info", "session_supervisor=debug").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// JSONL file to append to. `None` logs to stderr only.
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr when a `log_path` is set.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default JSONL log location: `~/.render-panel/logs/panel.jsonl`.
///
/// Falls back to the working directory when no home directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".render-panel")
        .join("logs")
        .join("panel.jsonl")
}

/// Initialize with defaults: stderr output at `info`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the global subscriber.
///
/// A log file that cannot be opened downgrades to stderr output instead of
/// aborting the process. Calling this twice is a no-op for the second call.
pub fn init_with_config(config: LogConfig) {
    let Some(log_path) = config.log_path.clone() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter(&config.default_level))
            .with_target(true)
            .with_writer(io::stderr)
            .compact()
            .try_init();
        return;
    };

    let writer = match JsonlFileWriter::new(&log_path) {
        Ok(writer) => writer,
        Err(e) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter(&config.default_level))
                .with_writer(io::stderr)
                .compact()
                .try_init();
            tracing::warn!(
                log_path = %log_path.display(),
                error = %e,
                "log file unavailable, logging to stderr"
            );
            return;
        }
    };

    let json_layer = JsonLayer::new(config.service_name.clone(), JsonlWriterFactory::new(writer));

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter("warn"))
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init();

    if installed.is_ok() {
        tracing::info!(
            service = %config.service_name,
            log_path = %log_path.display(),
            "observability initialized"
        );
    }
}

/// Re-export tracing macros so callers can use `observability::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
