//! Firestore-backed profile store.
//!
//! The REST API has no push channel, so live subscriptions poll the document
//! at the configured interval and forward changes.

mod client;
mod codec;

pub use client::{BearerToken, FirestoreProfileStore};
