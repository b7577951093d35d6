//! Item process-lifecycle management.
//!
//! Items are locally spawned child processes with a persisted record. The
//! module follows hexagonal architecture:
//!
//! - Domain types and the lifecycle state machine in [`domain`]
//! - Store and supervisor contracts in [`ports`]
//! - Filesystem, OS-process, and in-memory implementations in [`adapters`]
//! - The [`services::ItemManager`] orchestrator in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
