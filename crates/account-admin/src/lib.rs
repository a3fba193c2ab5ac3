//! Account administration for the Render panel.
//!
//! - [`AccountProvisioner`] creates an identity and its profile record
//!   without disturbing the operator's own session
//! - [`AdminConsole`] lists, disables, expires, annotates, force-logs-out and
//!   deletes accounts on behalf of an active admin session

mod console;
mod error;
mod provision;

pub use console::{parse_expiry, AccountRow, AdminConsole};
pub use error::{AdminError, AdminResult, ProvisionError, ProvisionResult};
pub use provision::{AccountProvisioner, NewAccount};
