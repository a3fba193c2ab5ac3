//! Per-record fan-out of profile events.
//!
//! Subscribers are notified after a write has been applied. Senders whose
//! subscription was dropped are pruned on the next notification.

use crate::{ProfileEvent, ProfileSubscription};
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub(crate) struct LiveHub {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<ProfileEvent>>>,
}

impl LiveHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber whose first event is `initial`.
    pub(crate) fn subscribe(&mut self, id: &str, initial: ProfileEvent) -> ProfileSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Receiver is alive here, so the send cannot fail.
        let _ = sender.send(initial);
        self.subscribers
            .entry(id.to_string())
            .or_default()
            .push(sender);
        ProfileSubscription::new(id, receiver)
    }

    /// Broadcast an event to every live subscriber of `id`.
    pub(crate) fn notify(&mut self, id: &str, event: ProfileEvent) {
        if let Some(senders) = self.subscribers.get_mut(id) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
            if senders.is_empty() {
                self.subscribers.remove(id);
            }
        }
    }

    /// Drop every subscriber of `id`. Their streams end.
    pub(crate) fn close(&mut self, id: &str) {
        self.subscribers.remove(id);
    }

    /// Number of subscribers of `id` that are still listening.
    pub(crate) fn subscriber_count(&mut self, id: &str) -> usize {
        match self.subscribers.get_mut(id) {
            Some(senders) => {
                senders.retain(|sender| !sender.is_closed());
                senders.len()
            }
            None => 0,
        }
    }
}
