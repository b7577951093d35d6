//! Shared world state for item lifecycle BDD scenarios.

use std::sync::Arc;

use itemkeeper::item::{
    adapters::memory::{InMemoryItemStore, InMemoryProcessSupervisor},
    domain::{ItemId, LaunchCommand, NewItem},
    services::{ItemManager, ItemManagerError},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Executable used by every scenario item.
pub const SCENARIO_BINARY: &str = "/opt/items/bin/demo";

/// Manager type used by the BDD world.
pub type TestItemManager = ItemManager<InMemoryItemStore, InMemoryProcessSupervisor, DefaultClock>;

/// Scenario world for item lifecycle behaviour tests.
pub struct ItemLifecycleWorld {
    pub manager: TestItemManager,
    pub supervisor: Arc<InMemoryProcessSupervisor>,
    pub last_result: Option<Result<(), ItemManagerError>>,
}

impl ItemLifecycleWorld {
    /// Creates a world over empty in-memory adapters.
    #[must_use]
    pub fn new() -> Self {
        let supervisor = Arc::new(InMemoryProcessSupervisor::new());
        let manager = ItemManager::new(
            Arc::new(InMemoryItemStore::new()),
            Arc::clone(&supervisor),
            Arc::new(DefaultClock),
        );

        Self {
            manager,
            supervisor,
            last_result: None,
        }
    }
}

impl Default for ItemLifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ItemLifecycleWorld {
    ItemLifecycleWorld::default()
}

/// Parses a scenario item id.
pub fn item_id(raw: &str) -> Result<ItemId, eyre::Report> {
    ItemId::new(raw).map_err(|err| eyre::eyre!("invalid item id in scenario: {err}"))
}

/// Builds a creation request launching [`SCENARIO_BINARY`].
pub fn runnable_item(raw: &str) -> Result<NewItem, eyre::Report> {
    let command = LaunchCommand::new(SCENARIO_BINARY)?.with_args(["--serve"]);
    Ok(NewItem::new(item_id(raw)?, "Demo", "1.0.0").with_command(command))
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
