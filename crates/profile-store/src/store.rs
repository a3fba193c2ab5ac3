//! Profile store contract.

use crate::{ProfilePatch, ProfileRecord, ProfileSubscription, StoreResult};
use async_trait::async_trait;

/// Keyed store of profile records.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a record once.
    async fn get(&self, id: &str) -> StoreResult<Option<ProfileRecord>>;

    /// Watch a record. The first event reflects the current state.
    async fn subscribe(&self, id: &str) -> StoreResult<ProfileSubscription>;

    /// Create or fully replace a record.
    async fn set(&self, record: &ProfileRecord) -> StoreResult<()>;

    /// Update some fields of an existing record. Fails with `NotFound` when
    /// the record is missing.
    async fn update(&self, id: &str, patch: &ProfilePatch) -> StoreResult<()>;

    /// Remove a record. Removing a missing record is not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// All records, newest first.
    async fn list(&self) -> StoreResult<Vec<ProfileRecord>>;
}
