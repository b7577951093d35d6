//! Itemkeeper: lifecycle management for locally spawned item processes.
//!
//! An item is a named, versioned unit backed by a child process. This crate
//! creates and persists item records, starts and stops their processes, and
//! observes how those processes end.
//!
//! # Architecture
//!
//! Itemkeeper follows hexagonal architecture principles:
//!
//! - **Domain**: the item aggregate and its state machine, free of I/O
//! - **Ports**: the `ItemStore` and `ProcessSupervisor` contracts
//! - **Adapters**: filesystem storage, OS processes, and in-memory doubles
//! - **Services**: the `ItemManager` orchestrator
//!
//! # Modules
//!
//! - [`item`]: Item records, process supervision, and lifecycle orchestration
//! - [`path_guard`]: Confinement of storage paths to a trusted root
//!
//! Expected failures are returned as typed errors. Lifecycle faults, such as
//! starting an item that is already running, surface as
//! [`item::services::ItemManagerError::Fault`]. The crate emits `tracing`
//! events and leaves subscriber setup to the embedding application.

pub mod item;
pub mod path_guard;
