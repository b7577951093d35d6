//! Domain model for item lifecycle management.
//!
//! Items are validated on construction and move through a fixed state
//! machine. The domain performs no I/O. Persistence and process control live
//! behind the ports.

mod error;
mod ids;
mod item;
mod launch;
mod status;

pub use error::{ItemDomainError, LifecycleFault, ParseItemStateError};
pub use ids::{ItemId, ItemName, ItemUrl, ItemVersion, ProcessId};
pub use item::{Item, ItemState, LifecycleOperation, NewItem, PersistedItemData};
pub use launch::LaunchCommand;
pub use status::ProcessStatus;
