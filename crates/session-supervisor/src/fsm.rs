//! Session validity state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │ Unauthenticated │ (initial)
//! └────────┬────────┘
//!          │ IdentityAcquired
//!          ▼
//! ┌─────────────────┐  ProfileValid   ┌─────────────────┐
//! │     Pending     │ ──────────────► │     Active      │ ◄─┐ ProfileValid
//! └───┬─────────┬───┘                 └───┬─────────┬───┘ ──┘
//!     │         │ ProfileRevoked          │         │
//!     │         └──────────┐  ┌───────────┘         │
//!     │                    ▼  ▼                     │
//!     │             ┌─────────────────┐             │
//!     │             │   Terminated    │             │
//!     │             └─────────────────┘             │
//!     │ StreamFailed                   StreamFailed │
//!     └──────────────► ┌─────────────────┐ ◄────────┘
//!                      │  Unverifiable   │
//!                      └─────────────────┘
//! ```
//!
//! Every state accepts `IdentityCleared` (→ Unauthenticated) and
//! `IdentityAcquired` (→ Pending). Re-subscribing after a stream failure is
//! an `IdentityAcquired` for the same identity.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub supervisor_machine(Unauthenticated)

    Unauthenticated => {
        IdentityAcquired => Pending,
        IdentityCleared => Unauthenticated
    },
    Pending => {
        IdentityAcquired => Pending,
        IdentityCleared => Unauthenticated,
        ProfileValid => Active,
        ProfileRevoked => Terminated,
        StreamFailed => Unverifiable
    },
    Active => {
        IdentityAcquired => Pending,
        IdentityCleared => Unauthenticated,
        // Re-validated on every push
        ProfileValid => Active,
        ProfileRevoked => Terminated,
        StreamFailed => Unverifiable
    },
    // Stale pushes after an eviction are rejected here
    Terminated => {
        IdentityAcquired => Pending,
        IdentityCleared => Unauthenticated
    },
    Unverifiable => {
        IdentityAcquired => Pending,
        IdentityCleared => Unauthenticated
    }
}

pub use supervisor_machine::Input as SupervisorInput;
pub use supervisor_machine::State as SupervisorMachineState;
pub use supervisor_machine::StateMachine as SupervisorMachine;

/// Externally visible supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// No identity is signed in.
    Unauthenticated,
    /// Identity known, its profile record not yet observed.
    Pending,
    /// Identity signed in and its record currently grants access.
    Active,
    /// The record revoked access; the identity is being signed out.
    Terminated,
    /// The record cannot be observed. Access is withheld but the identity
    /// stays signed in.
    Unverifiable,
}

impl SupervisorState {
    /// Whether the state still holds a subscription or is waiting for one.
    pub fn is_watching(&self) -> bool {
        matches!(self, SupervisorState::Pending | SupervisorState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Unauthenticated => "unauthenticated",
            SupervisorState::Pending => "pending",
            SupervisorState::Active => "active",
            SupervisorState::Terminated => "terminated",
            SupervisorState::Unverifiable => "unverifiable",
        }
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<&SupervisorMachineState> for SupervisorState {
    fn from(state: &SupervisorMachineState) -> Self {
        match state {
            SupervisorMachineState::Unauthenticated => SupervisorState::Unauthenticated,
            SupervisorMachineState::Pending => SupervisorState::Pending,
            SupervisorMachineState::Active => SupervisorState::Active,
            SupervisorMachineState::Terminated => SupervisorState::Terminated,
            SupervisorMachineState::Unverifiable => SupervisorState::Unverifiable,
        }
    }
}
