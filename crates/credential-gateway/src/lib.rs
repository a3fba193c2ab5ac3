//! Credential gateway for the Render panel.
//!
//! This crate provides:
//! - The `CredentialGateway` / `IsolatedContext` contract consumed by the
//!   session supervisor and the account provisioner
//! - Login identifier normalization (`member01` -> `member01@render.ai`)
//! - An in-memory gateway used by tests and the local demo backend
//! - A Firebase Identity Toolkit REST client

mod error;
mod firebase;
mod gateway;
mod identity;
mod memory;
mod normalize;

pub use error::{GatewayError, GatewayResult};
pub use firebase::{FirebaseGateway, FirebaseSession};
pub use gateway::{CredentialGateway, IsolatedContext};
pub use identity::Identity;
pub use memory::{AccountDirectory, InMemoryGateway, MAX_FAILED_ATTEMPTS, MIN_SECRET_LEN};
pub use normalize::{display_username, to_address, validate_address, PSEUDO_DOMAIN};
