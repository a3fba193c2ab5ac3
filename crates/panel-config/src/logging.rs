//! Logging initialization for the panel.
//!
//! Thin wrapper over the observability package so the binary has a single
//! call to make at startup.

use crate::Paths;
use observability::LogConfig;

const SERVICE_NAME: &str = "render-panel";

/// Initialize tracing for the panel.
///
/// Events go to `paths.log_file()` as JSONL; warnings and errors are mirrored
/// to stderr. `RUST_LOG` overrides `level`.
///
/// ```ignore
/// init_logging("info", &Paths::new()?);
/// tracing::info!("panel started");
/// ```
pub fn init_logging(level: &str, paths: &Paths) {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    });
}
