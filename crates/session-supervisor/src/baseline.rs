//! Password-version baselines.
//!
//! The password version seen when a session was established is the
//! reference for forced logouts. It is kept per identity together with the
//! session's establishment time, so a fresh sign-in starts a new baseline
//! while a restored session keeps comparing against the old one.

use crate::SupervisorResult;
use chrono::{DateTime, Utc};
use credential_gateway::Identity;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Password version observed when a session was established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBaseline {
    pub identity_id: String,
    pub established_at: DateTime<Utc>,
    pub password_version: u64,
}

impl SessionBaseline {
    pub fn new(identity: &Identity, password_version: u64) -> Self {
        Self {
            identity_id: identity.id.clone(),
            established_at: identity.established_at,
            password_version,
        }
    }

    /// Whether this baseline belongs to the session `identity` is in.
    pub fn belongs_to(&self, identity: &Identity) -> bool {
        self.identity_id == identity.id && self.established_at == identity.established_at
    }
}

/// Storage for session baselines, one per identity.
pub trait BaselineStore: Send + Sync {
    fn load(&self, identity_id: &str) -> SupervisorResult<Option<SessionBaseline>>;

    fn save(&self, baseline: &SessionBaseline) -> SupervisorResult<()>;

    /// Returns whether a baseline existed.
    fn remove(&self, identity_id: &str) -> SupervisorResult<bool>;

    /// Baseline for the session `identity` is in, ignoring baselines left
    /// over from earlier sessions of the same identity.
    fn load_for(&self, identity: &Identity) -> SupervisorResult<Option<SessionBaseline>> {
        Ok(self
            .load(&identity.id)?
            .filter(|baseline| baseline.belongs_to(identity)))
    }
}

/// Baselines kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    baselines: Mutex<HashMap<String, SessionBaseline>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn load(&self, identity_id: &str) -> SupervisorResult<Option<SessionBaseline>> {
        Ok(self.baselines.lock().get(identity_id).cloned())
    }

    fn save(&self, baseline: &SessionBaseline) -> SupervisorResult<()> {
        self.baselines
            .lock()
            .insert(baseline.identity_id.clone(), baseline.clone());
        Ok(())
    }

    fn remove(&self, identity_id: &str) -> SupervisorResult<bool> {
        Ok(self.baselines.lock().remove(identity_id).is_some())
    }
}

/// Baselines persisted as one JSON object keyed by identity id.
#[derive(Debug)]
pub struct FileBaselineStore {
    path: PathBuf,
    baselines: Mutex<HashMap<String, SessionBaseline>>,
}

impl FileBaselineStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> SupervisorResult<Self> {
        let path = path.into();
        let baselines: HashMap<String, SessionBaseline> = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable baseline file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), count = baselines.len(), "Loaded session baselines");
        Ok(Self {
            path,
            baselines: Mutex::new(baselines),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, baselines: &HashMap<String, SessionBaseline>) -> SupervisorResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(baselines)?)?;
        Ok(())
    }
}

impl BaselineStore for FileBaselineStore {
    fn load(&self, identity_id: &str) -> SupervisorResult<Option<SessionBaseline>> {
        Ok(self.baselines.lock().get(identity_id).cloned())
    }

    fn save(&self, baseline: &SessionBaseline) -> SupervisorResult<()> {
        let mut baselines = self.baselines.lock();
        baselines.insert(baseline.identity_id.clone(), baseline.clone());
        self.persist(&baselines)
    }

    fn remove(&self, identity_id: &str) -> SupervisorResult<bool> {
        let mut baselines = self.baselines.lock();
        if baselines.remove(identity_id).is_none() {
            return Ok(false);
        }
        self.persist(&baselines)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_load_for_ignores_previous_session() {
        let store = MemoryBaselineStore::new();
        let identity = Identity::new("uid-1", "member01@render.ai");
        store.save(&SessionBaseline::new(&identity, 2)).unwrap();

        assert_eq!(
            store.load_for(&identity).unwrap().map(|b| b.password_version),
            Some(2)
        );

        let fresh = Identity {
            established_at: identity.established_at + Duration::minutes(5),
            ..identity
        };
        assert!(store.load_for(&fresh).unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baselines.json");
        let identity = Identity::new("uid-1", "member01@render.ai");

        {
            let store = FileBaselineStore::open(&path).unwrap();
            store.save(&SessionBaseline::new(&identity, 4)).unwrap();
        }

        let reopened = FileBaselineStore::open(&path).unwrap();
        let baseline = reopened.load_for(&identity).unwrap().unwrap();
        assert_eq!(baseline.password_version, 4);

        assert!(reopened.remove("uid-1").unwrap());
        assert!(!reopened.remove("uid-1").unwrap());
        let reopened = FileBaselineStore::open(&path).unwrap();
        assert!(reopened.load("uid-1").unwrap().is_none());
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baselines.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileBaselineStore::open(&path).unwrap();
        assert!(store.load("uid-1").unwrap().is_none());
    }
}
