//! Port contracts for item lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by the item manager.

pub mod store;
pub mod supervisor;

pub use store::{ItemStore, StoreError, StoreResult};
pub use supervisor::{
    PollError, ProcessSupervisor, SpawnError, SpawnRequest, StopError, StopOutcome,
    TrackedProcess,
};
