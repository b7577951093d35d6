//! Application services for item lifecycle orchestration.

mod config;
mod locks;
mod manager;

pub use config::{ConfigError, DEFAULT_GRACE_PERIOD, ItemManagerConfig};
pub use manager::{
    BulkResults, ItemManager, ItemManagerError, ItemManagerResult, ProductionItemManager, RefreshReport,
};
