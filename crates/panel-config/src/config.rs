//! Configuration management for the panel.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Firebase web API key (can be overridden at compile time via FIREBASE_API_KEY env var).
pub const DEFAULT_FIREBASE_API_KEY: &str = match option_env!("FIREBASE_API_KEY") {
    Some(key) => key,
    None => "local-dev-key",
};

/// Firebase project id (can be overridden at compile time via FIREBASE_PROJECT_ID env var).
pub const DEFAULT_FIREBASE_PROJECT_ID: &str = match option_env!("FIREBASE_PROJECT_ID") {
    Some(project) => project,
    None => "perpect-ai",
};

/// Identity Toolkit REST base.
pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Firestore REST base.
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// How often the Firestore profile subscription polls its document.
pub const DEFAULT_PROFILE_POLL_INTERVAL_MS: u64 = 2_000;

const ENV_LOG_LEVEL: &str = "RENDER_PANEL_LOG_LEVEL";
const ENV_API_KEY: &str = "RENDER_PANEL_FIREBASE_API_KEY";
const ENV_PROJECT_ID: &str = "RENDER_PANEL_FIREBASE_PROJECT_ID";

/// Main panel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Firebase web API key.
    #[serde(default = "default_firebase_api_key")]
    pub firebase_api_key: String,
    /// Firebase project id, used to address Firestore documents.
    #[serde(default = "default_firebase_project_id")]
    pub firebase_project_id: String,
    /// Identity Toolkit REST base URL.
    #[serde(default = "default_identity_toolkit_url")]
    pub identity_toolkit_url: String,
    /// Firestore REST base URL.
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    /// Poll interval of the profile subscription in milliseconds.
    #[serde(default = "default_profile_poll_interval_ms")]
    pub profile_poll_interval_ms: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_firebase_api_key() -> String {
    DEFAULT_FIREBASE_API_KEY.to_string()
}

fn default_firebase_project_id() -> String {
    DEFAULT_FIREBASE_PROJECT_ID.to_string()
}

fn default_identity_toolkit_url() -> String {
    DEFAULT_IDENTITY_TOOLKIT_URL.to_string()
}

fn default_firestore_url() -> String {
    DEFAULT_FIRESTORE_URL.to_string()
}

fn default_profile_poll_interval_ms() -> u64 {
    DEFAULT_PROFILE_POLL_INTERVAL_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            firebase_api_key: default_firebase_api_key(),
            firebase_project_id: default_firebase_project_id(),
            identity_toolkit_url: default_identity_toolkit_url(),
            firestore_url: default_firestore_url(),
            profile_poll_interval_ms: default_profile_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from `paths.config_file()`, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from environment variables. Empty values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(log_level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = log_level;
        }
        if let Some(api_key) = non_empty(ENV_API_KEY) {
            self.firebase_api_key = api_key;
        }
        if let Some(project_id) = non_empty(ENV_PROJECT_ID) {
            self.firebase_project_id = project_id;
        }
    }

    fn validate(&self) -> CoreResult<()> {
        self.identity_toolkit_url()?;
        self.firestore_url()?;
        if self.profile_poll_interval_ms == 0 {
            return Err(CoreError::Config(
                "profile_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Identity Toolkit base as a parsed URL.
    pub fn identity_toolkit_url(&self) -> CoreResult<Url> {
        Url::parse(&self.identity_toolkit_url).map_err(CoreError::from)
    }

    /// Firestore base as a parsed URL.
    pub fn firestore_url(&self) -> CoreResult<Url> {
        Url::parse(&self.firestore_url).map_err(CoreError::from)
    }

    /// Poll interval as a `Duration`.
    pub fn profile_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.profile_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.identity_toolkit_url, DEFAULT_IDENTITY_TOOLKIT_URL);
        assert_eq!(config.firestore_url, DEFAULT_FIRESTORE_URL);
        assert_eq!(
            config.profile_poll_interval_ms,
            DEFAULT_PROFILE_POLL_INTERVAL_MS
        );
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.firebase_project_id, DEFAULT_FIREBASE_PROJECT_ID);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            firebase_project_id: "panel-test".to_string(),
            profile_poll_interval_ms: 250,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.firestore_url, DEFAULT_FIRESTORE_URL);
    }

    #[test]
    fn test_apply_env_overrides_and_ignores_blank() {
        let env: HashMap<&str, &str> = [
            (ENV_LOG_LEVEL, "trace"),
            (ENV_API_KEY, "  "),
            (ENV_PROJECT_ID, "other-project"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.firebase_api_key, DEFAULT_FIREBASE_API_KEY);
        assert_eq!(config.firebase_project_id, "other-project");
    }

    #[test]
    fn test_validate_rejects_bad_url_and_zero_interval() {
        let bad_url = Config {
            firestore_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(bad_url.validate(), Err(CoreError::InvalidUrl(_))));

        let zero = Config {
            profile_poll_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(zero.validate(), Err(CoreError::Config(_))));
    }
}
