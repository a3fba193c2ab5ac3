//! In-process profile store.
//!
//! Writes and notifications happen under one lock, so every subscriber sees
//! writes in the order they were applied and a new subscriber's initial
//! event is never older than a write it could have missed.

use crate::live::LiveHub;
use crate::{
    ProfileEvent, ProfilePatch, ProfileRecord, ProfileStore, ProfileSubscription, StoreError,
    StoreResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<String, ProfileRecord>,
    hub: LiveHub,
    write_failure: Option<String>,
}

impl StoreState {
    fn check_writable(&self) -> StoreResult<()> {
        match &self.write_failure {
            Some(message) => Err(StoreError::Status {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn current_event(&self, id: &str) -> ProfileEvent {
        match self.records.get(id) {
            Some(record) => ProfileEvent::Present(record.clone()),
            None => ProfileEvent::Absent,
        }
    }
}

/// Profile store held in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = ProfileRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock();
            for record in records {
                state.records.insert(record.id.clone(), record);
            }
        }
        store
    }

    /// Snapshot of one record without going through the async contract.
    pub fn record(&self, id: &str) -> Option<ProfileRecord> {
        self.state.lock().records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live subscribers watching `id`.
    pub fn subscriber_count(&self, id: &str) -> usize {
        self.state.lock().hub.subscriber_count(id)
    }

    /// Deliver an error to every subscriber of `id` and end their streams.
    pub fn fail_subscribers(&self, id: &str, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.hub.notify(id, ProfileEvent::Error(message.into()));
        state.hub.close(id);
    }

    /// Deliver an arbitrary event to the subscribers of `id` without
    /// touching the stored record.
    pub fn inject(&self, id: &str, event: ProfileEvent) {
        self.state.lock().hub.notify(id, event);
    }

    /// Make every write fail with `message` until cleared with `None`.
    pub fn set_write_failure(&self, message: Option<String>) {
        self.state.lock().write_failure = message;
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, id: &str) -> StoreResult<Option<ProfileRecord>> {
        Ok(self.state.lock().records.get(id).cloned())
    }

    async fn subscribe(&self, id: &str) -> StoreResult<ProfileSubscription> {
        let mut state = self.state.lock();
        let initial = state.current_event(id);
        debug!(profile_id = %id, "Profile subscription opened");
        Ok(state.hub.subscribe(id, initial))
    }

    async fn set(&self, record: &ProfileRecord) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.check_writable()?;
        state.records.insert(record.id.clone(), record.clone());
        state
            .hub
            .notify(&record.id, ProfileEvent::Present(record.clone()));
        Ok(())
    }

    async fn update(&self, id: &str, patch: &ProfilePatch) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.check_writable()?;
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(patch);
        let updated = record.clone();
        state.hub.notify(id, ProfileEvent::Present(updated));
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.check_writable()?;
        if state.records.remove(id).is_some() {
            state.hub.notify(id, ProfileEvent::Absent);
        }
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ProfileRecord>> {
        let mut records: Vec<_> = self.state.lock().records.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, day: u32) -> ProfileRecord {
        ProfileRecord::new(
            id,
            format!("{id}@render.ai"),
            Role::Member,
            Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_subscribe_reports_current_state_first() {
        let store = InMemoryProfileStore::with_records([record("a", 1)]);

        let mut present = store.subscribe("a").await.unwrap();
        let mut absent = store.subscribe("missing").await.unwrap();

        assert_eq!(present.recv().await, Some(ProfileEvent::Present(record("a", 1))));
        assert_eq!(absent.recv().await, Some(ProfileEvent::Absent));
    }

    #[tokio::test]
    async fn test_writes_are_streamed_in_order() {
        let store = InMemoryProfileStore::with_records([record("a", 1)]);
        let mut sub = store.subscribe("a").await.unwrap();
        sub.recv().await.unwrap();

        store.update("a", &ProfilePatch::disabled(true)).await.unwrap();
        store.update("a", &ProfilePatch::password_version(2)).await.unwrap();
        store.delete("a").await.unwrap();

        let first = sub.recv().await.unwrap();
        assert!(first.record().unwrap().is_disabled);
        assert_eq!(first.record().unwrap().password_version, 1);
        let second = sub.recv().await.unwrap();
        assert_eq!(second.record().unwrap().password_version, 2);
        assert_eq!(sub.recv().await, Some(ProfileEvent::Absent));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryProfileStore::new();
        let err = store
            .update("ghost", &ProfilePatch::disabled(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = InMemoryProfileStore::new();
        store.delete("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = InMemoryProfileStore::with_records([record("old", 1), record("new", 9), record("mid", 5)]);
        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_fail_subscribers_ends_stream() {
        let store = InMemoryProfileStore::with_records([record("a", 1)]);
        let mut sub = store.subscribe("a").await.unwrap();
        sub.recv().await.unwrap();

        store.fail_subscribers("a", "permission denied");

        assert_eq!(
            sub.recv().await,
            Some(ProfileEvent::Error("permission denied".into()))
        );
        assert_eq!(sub.recv().await, None);
        assert_eq!(store.subscriber_count("a"), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_counting() {
        let store = InMemoryProfileStore::with_records([record("a", 1)]);
        let sub = store.subscribe("a").await.unwrap();
        assert_eq!(store.subscriber_count("a"), 1);
        drop(sub);
        assert_eq!(store.subscriber_count("a"), 0);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_state_untouched() {
        let store = InMemoryProfileStore::new();
        store.set_write_failure(Some("offline".into()));

        assert!(store.set(&record("a", 1)).await.is_err());
        assert!(store.is_empty());

        store.set_write_failure(None);
        store.set(&record("a", 1)).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
