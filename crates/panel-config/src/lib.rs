//! Configuration, filesystem layout and logging setup for the Render panel.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_FIREBASE_API_KEY, DEFAULT_FIREBASE_PROJECT_ID, DEFAULT_FIRESTORE_URL,
    DEFAULT_IDENTITY_TOOLKIT_URL, DEFAULT_LOG_LEVEL, DEFAULT_PROFILE_POLL_INTERVAL_MS,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
