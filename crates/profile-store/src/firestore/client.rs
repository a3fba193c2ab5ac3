//! Firestore REST profile store.
//!
//! Records live at `projects/{project}/databases/(default)/documents/users/{id}`.
//! Requests carry the signed-in client's id token as a bearer so that the
//! backend's security rules apply to the panel exactly as to the web app.

use super::codec::{decode_document, encode_patch, encode_record, Document, DocumentPage};
use crate::{
    ProfileEvent, ProfilePatch, ProfileRecord, ProfileStore, ProfileSubscription, StoreError,
    StoreResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Source of the bearer token attached to every request.
pub type BearerToken = Arc<dyn Fn() -> Option<String> + Send + Sync>;

const COLLECTION: &str = "users";
const LIST_PAGE_SIZE: u32 = 300;

/// Consecutive transient poll failures tolerated before a subscription
/// reports an error.
const MAX_TRANSIENT_POLL_FAILURES: u32 = 3;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Profile store backed by the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreProfileStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    token: BearerToken,
    poll_interval: Duration,
}

impl fmt::Debug for FirestoreProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreProfileStore")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirestoreProfileStore {
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        token: BearerToken,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            project_id: project_id.into(),
            token,
            poll_interval,
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            COLLECTION
        )
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (self.token)() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-success response into a store error.
    async fn error_for(response: reqwest::Response, id: &str) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP {}", status));
        debug!(status = %status, message = %message, "firestore error");

        match status.as_u16() {
            401 | 403 => StoreError::PermissionDenied(message),
            404 => StoreError::NotFound(id.to_string()),
            code => StoreError::Status {
                status: code,
                message,
            },
        }
    }

    async fn write_fields(
        &self,
        id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
        query: &[(&str, &str)],
    ) -> StoreResult<()> {
        let response = self
            .authorize(
                self.http
                    .patch(self.document_url(id))
                    .query(query)
                    .json(&json!({ "fields": fields })),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, id).await);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FirestoreProfileStore {
    async fn get(&self, id: &str) -> StoreResult<Option<ProfileRecord>> {
        let response = self
            .authorize(self.http.get(self.document_url(id)))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response, id).await);
        }

        let document: Document = response.json().await?;
        decode_document(&document).map(Some)
    }

    async fn subscribe(&self, id: &str) -> StoreResult<ProfileSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let watched = id.to_string();
        let fetch = move || {
            let store = store.clone();
            let id = watched.clone();
            async move { store.get(&id).await }
        };

        let task = tokio::spawn(poll_loop(fetch, self.poll_interval, tx));
        debug!(profile_id = %id, "Profile poller started");
        Ok(ProfileSubscription::new(id, rx).with_cancel(move || task.abort()))
    }

    async fn set(&self, record: &ProfileRecord) -> StoreResult<()> {
        self.write_fields(&record.id, encode_record(record)?, &[])
            .await?;
        info!(profile_id = %record.id, "Profile written");
        Ok(())
    }

    async fn update(&self, id: &str, patch: &ProfilePatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut query: Vec<(&str, &str)> = patch
            .field_paths()
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        query.push(("currentDocument.exists", "true"));

        self.write_fields(id, encode_patch(patch)?, &query).await?;
        info!(profile_id = %id, fields = ?patch.field_paths(), "Profile updated");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let response = self
            .authorize(self.http.delete(self.document_url(id)))
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Self::error_for(response, id).await);
        }
        info!(profile_id = %id, "Profile deleted");
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ProfileRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = LIST_PAGE_SIZE.to_string();

        loop {
            let mut query = vec![("pageSize", page_size.clone())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let response = self
                .authorize(self.http.get(self.collection_url()).query(&query))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::error_for(response, COLLECTION).await);
            }

            let page: DocumentPage = response.json().await?;
            for document in &page.documents {
                match decode_document(document) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(document = %document.name, error = %e, "Skipping malformed profile"),
                }
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

/// Poll a record and forward changes.
///
/// The first result is always sent. After that only changes in content or
/// presence are. A permanent error, or too many transient ones in a row, is
/// sent as [`ProfileEvent::Error`] and ends the loop. The loop also ends
/// once the receiver is gone.
pub(crate) async fn poll_loop<F, Fut>(
    mut fetch: F,
    interval: Duration,
    tx: mpsc::UnboundedSender<ProfileEvent>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<Option<ProfileRecord>>>,
{
    let mut last: Option<Option<ProfileRecord>> = None;
    let mut transient_failures = 0u32;

    loop {
        match fetch().await {
            Ok(current) => {
                transient_failures = 0;
                if last.as_ref() != Some(&current) {
                    let event = match &current {
                        Some(record) => ProfileEvent::Present(record.clone()),
                        None => ProfileEvent::Absent,
                    };
                    if tx.send(event).is_err() {
                        return;
                    }
                    last = Some(current);
                }
            }
            Err(e) if e.is_transient() && transient_failures + 1 < MAX_TRANSIENT_POLL_FAILURES => {
                transient_failures += 1;
                warn!(error = %e, attempt = transient_failures, "Profile poll failed, retrying");
            }
            Err(e) => {
                warn!(error = %e, "Profile poll failed, ending subscription");
                let _ = tx.send(ProfileEvent::Error(e.to_string()));
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tx.closed() => return,
        }
    }
}
