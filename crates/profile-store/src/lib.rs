//! Profile store for the Render panel.
//!
//! One profile record per account, keyed by the account's identity id. A
//! record's existence is what grants access: deleting it revokes the account.
//!
//! This crate provides:
//! - `ProfileRecord` / `ProfilePatch` with the wire shape of the `users` collection
//! - The `ProfileStore` contract and `ProfileSubscription`, a cancellable
//!   stream of record / absent / error events
//! - `InMemoryProfileStore` with live fan-out to subscribers
//! - `FirestoreProfileStore` over the Firestore REST documents API

mod error;
pub mod firestore;
mod live;
mod memory;
mod store;
mod subscription;
mod types;

pub use error::{StoreError, StoreResult};
pub use firestore::{BearerToken, FirestoreProfileStore};
pub use memory::InMemoryProfileStore;
pub use store::ProfileStore;
pub use subscription::{ProfileEvent, ProfileSubscription};
pub use types::{ProfilePatch, ProfileRecord, Role, INITIAL_PASSWORD_VERSION};
