//! Live profile subscriptions.

use crate::ProfileRecord;
use futures_util::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One observation of a watched profile record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    /// The record exists with this content.
    Present(ProfileRecord),
    /// No record exists for the id.
    Absent,
    /// The stream failed. No further events follow.
    Error(String),
}

impl ProfileEvent {
    pub fn record(&self) -> Option<&ProfileRecord> {
        match self {
            ProfileEvent::Present(record) => Some(record),
            _ => None,
        }
    }
}

type CancelGuard = Box<dyn FnOnce() + Send>;

/// Stream of [`ProfileEvent`]s for a single record.
///
/// The first event describes the record's current state. Dropping the
/// subscription cancels it; nothing is delivered afterwards.
pub struct ProfileSubscription {
    id: String,
    receiver: mpsc::UnboundedReceiver<ProfileEvent>,
    cancel: Option<CancelGuard>,
}

impl ProfileSubscription {
    pub(crate) fn new(id: impl Into<String>, receiver: mpsc::UnboundedReceiver<ProfileEvent>) -> Self {
        Self {
            id: id.into(),
            receiver,
            cancel: None,
        }
    }

    /// Attach a callback that runs once when the subscription is dropped.
    pub(crate) fn with_cancel(mut self, cancel: impl FnOnce() + Send + 'static) -> Self {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// Id of the watched record.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next event. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ProfileEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ProfileEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for ProfileSubscription {
    type Item = ProfileEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ProfileSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for ProfileSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSubscription")
            .field("id", &self.id)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_recv_and_stream_yield_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = ProfileSubscription::new("uid-1", rx);

        tx.send(ProfileEvent::Absent).unwrap();
        tx.send(ProfileEvent::Error("gone".into())).unwrap();
        drop(tx);

        assert_eq!(sub.recv().await, Some(ProfileEvent::Absent));
        assert_eq!(sub.next().await, Some(ProfileEvent::Error("gone".into())));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_runs_cancel_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let counter = calls.clone();
        let sub = ProfileSubscription::new("uid-1", rx).with_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(tx.send(ProfileEvent::Absent).is_err());
    }
}
