//! Session validity supervision for the Render panel.
//!
//! A session only grants access while the signed-in identity's profile
//! record exists, is enabled, has not expired and has not been force-logged
//! out since sign-in. This crate watches that record and signs the identity
//! out when any of those stop holding.
//!
//! - `fsm`: rust-fsm state machine and the public [`SupervisorState`]
//! - `verdict`: evaluation of a record against the session baseline
//! - `baseline`: password-version baselines (memory and JSON file)
//! - `supervisor`: the task driving subscriptions, timers and evictions
//! - `context`: [`SessionContext`], the object the binary owns

mod baseline;
mod clock;
mod context;
mod error;
mod fsm;
mod supervisor;
mod verdict;

#[cfg(test)]
mod tests;

pub use baseline::{BaselineStore, FileBaselineStore, MemoryBaselineStore, SessionBaseline};
pub use clock::{Clock, SystemClock, TokioClock};
pub use context::SessionContext;
pub use error::{SupervisorError, SupervisorResult};
pub use fsm::{SupervisorInput, SupervisorMachine, SupervisorMachineState, SupervisorState};
pub use supervisor::{Supervisor, SupervisorHandle, SupervisorSnapshot};
pub use verdict::{evaluate, RevocationReason, Verdict};
