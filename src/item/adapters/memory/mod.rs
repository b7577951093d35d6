//! In-memory adapters for deterministic tests and embedding.

mod store;
mod supervisor;

pub use store::InMemoryItemStore;
pub use supervisor::InMemoryProcessSupervisor;
