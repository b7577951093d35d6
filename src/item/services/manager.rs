//! Item lifecycle orchestration over a store and a process supervisor.

use super::config::{DEFAULT_GRACE_PERIOD, ItemManagerConfig};
use super::locks::ItemLocks;
use crate::item::{
    adapters::{fs::FsItemStore, process::TokioProcessSupervisor},
    domain::{Item, ItemId, ItemState, LifecycleFault, NewItem, ProcessStatus},
    ports::{
        ItemStore, PollError, ProcessSupervisor, SpawnError, SpawnRequest, StopError, StoreError,
    },
};
use mockable::{Clock, DefaultClock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Service-level errors for item lifecycle operations.
#[derive(Debug, Error)]
pub enum ItemManagerError {
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller or implementation broke a lifecycle contract.
    #[error(transparent)]
    Fault(#[from] LifecycleFault),

    /// Spawning the item's process failed. The item is now `failed`.
    #[error("failed to start item {id}: {source}")]
    Spawn {
        /// Item identifier.
        id: ItemId,
        /// Supervisor failure.
        #[source]
        source: SpawnError,
    },

    /// Polling the item's process failed. The item is now `failed`.
    #[error("failed to poll item {id}: {source}")]
    Poll {
        /// Item identifier.
        id: ItemId,
        /// Supervisor failure.
        #[source]
        source: PollError,
    },

    /// Stopping the item's process failed.
    #[error("failed to stop item {id}: {source}")]
    Stop {
        /// Item identifier.
        id: ItemId,
        /// Supervisor failure.
        #[source]
        source: StopError,
    },

    /// The item is active and cannot be deleted.
    #[error("item {id} is {state} and cannot be deleted")]
    Busy {
        /// Item identifier.
        id: ItemId,
        /// State the item was in.
        state: ItemState,
    },

    /// The item has no launch command.
    #[error("item {0} has no launch command")]
    MissingCommand(ItemId),

    /// A fan-out task was cancelled before completing.
    #[error("item task did not complete: {0}")]
    Runtime(#[from] JoinError),
}

impl ItemManagerError {
    /// Returns whether the error is a programming fault rather than an
    /// expected failure.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

/// Result type for item manager operations.
pub type ItemManagerResult<T> = Result<T, ItemManagerError>;

/// Outcome of refreshing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Item after the observed status was applied.
    pub item: Item,
    /// Status reported by the supervisor, verbatim.
    pub status: ProcessStatus,
}

/// Per-item results of a bulk operation, sorted by id.
pub type BulkResults<T> = Vec<(ItemId, ItemManagerResult<T>)>;

/// Item manager wired to the filesystem store and OS processes.
pub type ProductionItemManager = ItemManager<FsItemStore, TokioProcessSupervisor, DefaultClock>;

/// Item lifecycle orchestration service.
///
/// Every operation on one id runs under that id's lock, including its
/// supervisor awaits. Operations on distinct ids proceed concurrently.
pub struct ItemManager<S, P, C>
where
    S: ItemStore + 'static,
    P: ProcessSupervisor + 'static,
    C: Clock + Send + Sync + 'static,
{
    store: Arc<S>,
    supervisor: Arc<P>,
    clock: Arc<C>,
    locks: Arc<ItemLocks>,
    grace_period: Duration,
}

impl<S, P, C> Clone for ItemManager<S, P, C>
where
    S: ItemStore + 'static,
    P: ProcessSupervisor + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            supervisor: Arc::clone(&self.supervisor),
            clock: Arc::clone(&self.clock),
            locks: Arc::clone(&self.locks),
            grace_period: self.grace_period,
        }
    }
}

impl ProductionItemManager {
    /// Builds a manager over the configured storage root.
    #[must_use]
    pub fn from_config(config: &ItemManagerConfig) -> Self {
        Self::new(
            Arc::new(FsItemStore::new(config.root())),
            Arc::new(TokioProcessSupervisor::new()),
            Arc::new(DefaultClock),
        )
        .with_grace_period(config.grace_period())
    }
}

impl<S, P, C> ItemManager<S, P, C>
where
    S: ItemStore + 'static,
    P: ProcessSupervisor + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a manager with the default grace period.
    #[must_use]
    pub fn new(store: Arc<S>, supervisor: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            store,
            supervisor,
            clock,
            locks: Arc::new(ItemLocks::default()),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Sets the grace period used when stopping items.
    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Returns the grace period used when stopping items.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Creates and persists a new stopped item.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Store`] when the id is taken or a field
    /// is invalid.
    pub async fn create(&self, new_item: NewItem) -> ItemManagerResult<Item> {
        let _guard = self.locks.acquire(&new_item.id).await;
        let item = self.store.create(new_item, self.clock.utc())?;
        info!(item_id = %item.id(), name = %item.name(), "item created");
        Ok(item)
    }

    /// Loads one item.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Store`] when the item is missing or
    /// unreadable.
    pub fn get(&self, id: &ItemId) -> ItemManagerResult<Item> {
        Ok(self.store.load(id)?)
    }

    /// Lists every readable item, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Store`] when the store cannot be read.
    pub fn list(&self) -> ItemManagerResult<Vec<Item>> {
        Ok(self.store.list()?)
    }

    /// Starts a stopped or failed item.
    ///
    /// The item is persisted as `starting` before the spawn. A spawn failure
    /// leaves it `failed` with no pid.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Fault`] from any other state,
    /// [`ItemManagerError::MissingCommand`] when the item has no launch
    /// command, and [`ItemManagerError::Spawn`] when the spawn fails.
    pub async fn start(&self, id: &ItemId) -> ItemManagerResult<Item> {
        let _guard = self.locks.acquire(id).await;
        let mut item = self.store.load(id)?;
        item.begin_start(&*self.clock)?;
        let Some(command) = item.command().cloned() else {
            return Err(ItemManagerError::MissingCommand(id.clone()));
        };
        self.store.save(&item)?;

        match self
            .supervisor
            .spawn(SpawnRequest::new(id.clone(), command))
            .await
        {
            Ok(pid) => {
                item.mark_running(pid, &*self.clock)?;
                if let Err(err) = self.store.save(&item) {
                    self.abandon_spawn(&mut item).await;
                    return Err(err.into());
                }
                info!(item_id = %id, %pid, "item started");
                Ok(item)
            }
            Err(source) => {
                warn!(item_id = %id, error = %source, "item failed to start");
                item.mark_failed(&*self.clock)?;
                self.store.save(&item)?;
                Err(ItemManagerError::Spawn {
                    id: id.clone(),
                    source,
                })
            }
        }
    }

    /// Stops an item's process.
    ///
    /// Stopping a stopped item does nothing. Stopping a failed item makes
    /// sure no process is left behind and keeps it `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Fault`] while the item is `starting` or
    /// `stopping` and [`ItemManagerError::Stop`] when termination fails, in
    /// which case the item is `failed`.
    pub async fn stop(&self, id: &ItemId) -> ItemManagerResult<Item> {
        let _guard = self.locks.acquire(id).await;
        let mut item = self.store.load(id)?;
        match item.state() {
            ItemState::Stopped => {
                debug!(item_id = %id, "item already stopped");
                return Ok(item);
            }
            ItemState::Failed => {
                self.ensure_no_process(id).await?;
                return Ok(item);
            }
            ItemState::Starting | ItemState::Running | ItemState::Stopping => {}
        }

        item.begin_stop(&*self.clock)?;
        self.store.save(&item)?;
        info!(item_id = %id, pid = ?item.pid(), "stopping item");

        match self.supervisor.stop(id, self.grace_period).await {
            Ok(outcome) => {
                item.mark_stopped(&*self.clock)?;
                self.store.save(&item)?;
                info!(item_id = %id, ?outcome, "item stopped");
                Ok(item)
            }
            Err(source) => {
                warn!(item_id = %id, error = %source, "item failed to stop");
                item.mark_failed(&*self.clock)?;
                self.store.save(&item)?;
                Err(ItemManagerError::Stop {
                    id: id.clone(),
                    source,
                })
            }
        }
    }

    /// Polls an active item's process and applies the observed status.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Fault`] unless the item is `starting`,
    /// `running`, or `stopping`, and [`ItemManagerError::Poll`] when the
    /// poll fails, in which case the item is `failed`.
    pub async fn refresh(&self, id: &ItemId) -> ItemManagerResult<RefreshReport> {
        let _guard = self.locks.acquire(id).await;
        let item = self.store.load(id)?;
        item.ensure_refreshable()?;
        self.poll_and_apply(item).await
    }

    /// Refreshes every active item concurrently.
    ///
    /// Items that left the active states or were deleted before their turn
    /// are left out of the results.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Store`] when the item list cannot be read
    /// and [`ItemManagerError::Runtime`] when a refresh task is cancelled.
    /// Per-item failures are reported in the returned list.
    pub async fn refresh_all(&self) -> ItemManagerResult<BulkResults<RefreshReport>> {
        let ids = self.ids_where(ItemState::is_active)?;
        let results = self
            .fan_out(ids, |manager, id| async move {
                manager.refresh_if_active(&id).await
            })
            .await?;
        Ok(results
            .into_iter()
            .filter_map(|(id, result)| result.transpose().map(|outcome| (id, outcome)))
            .collect())
    }

    /// Moves a failed item back to `stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Fault`] unless the item is `failed`.
    pub async fn reset(&self, id: &ItemId) -> ItemManagerResult<Item> {
        let _guard = self.locks.acquire(id).await;
        let mut item = self.store.load(id)?;
        item.reset(&*self.clock)?;
        self.store.save(&item)?;
        info!(item_id = %id, "item reset");
        Ok(item)
    }

    /// Deletes a stopped or failed item and its stored data.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Busy`] while the item is active, without
    /// side effects.
    pub async fn delete(&self, id: &ItemId) -> ItemManagerResult<()> {
        let _guard = self.locks.acquire(id).await;
        let item = self.store.load(id)?;
        let state = item.state();
        if !state.is_deletable() {
            return Err(ItemManagerError::Busy {
                id: id.clone(),
                state,
            });
        }

        if state == ItemState::Failed {
            self.ensure_no_process(id).await?;
        }
        self.store.delete(id)?;
        if !self.supervisor.release(id).await {
            warn!(item_id = %id, "process still tracked for deleted item");
        }
        info!(item_id = %id, "item deleted");
        Ok(())
    }

    /// Stops every running item concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`ItemManagerError::Store`] when the item list cannot be read
    /// and [`ItemManagerError::Runtime`] when a stop task is cancelled.
    /// Per-item failures are reported in the returned list.
    pub async fn shutdown(&self) -> ItemManagerResult<BulkResults<Item>> {
        let ids = self.ids_where(|state| state == ItemState::Running)?;
        info!(count = ids.len(), "stopping running items");
        self.fan_out(ids, |manager, id| async move { manager.stop(&id).await })
            .await
    }

    /// Refreshes `id` when it is still active once its lock is held.
    async fn refresh_if_active(&self, id: &ItemId) -> ItemManagerResult<Option<RefreshReport>> {
        let _guard = self.locks.acquire(id).await;
        let item = match self.store.load(id) {
            Ok(item) => item,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if !item.state().is_active() {
            debug!(item_id = %id, state = %item.state(), "item no longer active, skipping refresh");
            return Ok(None);
        }
        self.poll_and_apply(item).await.map(Some)
    }

    /// Polls an active item's process and applies the status. The caller
    /// holds the item's lock.
    async fn poll_and_apply(&self, mut item: Item) -> ItemManagerResult<RefreshReport> {
        let id = item.id().clone();
        let previous = item.state();

        match self.supervisor.poll(&id).await {
            Ok(status) => {
                if item.observe(status, &*self.clock)? {
                    self.store.save(&item)?;
                    info!(item_id = %id, from = %previous, to = %item.state(), %status, "item state changed");
                }
                Ok(RefreshReport { item, status })
            }
            Err(source) => {
                warn!(item_id = %id, error = %source, "item poll failed");
                item.mark_failed(&*self.clock)?;
                self.store.save(&item)?;
                Err(ItemManagerError::Poll { id, source })
            }
        }
    }

    fn ids_where(&self, keep: impl Fn(ItemState) -> bool) -> ItemManagerResult<Vec<ItemId>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|item| keep(item.state()))
            .map(|item| item.id().clone())
            .collect())
    }

    async fn fan_out<T, F, Fut>(&self, ids: Vec<ItemId>, operation: F) -> ItemManagerResult<BulkResults<T>>
    where
        T: Send + 'static,
        F: Fn(Self, ItemId) -> Fut,
        Fut: Future<Output = ItemManagerResult<T>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for id in ids {
            let pending = operation(self.clone(), id.clone());
            tasks.spawn(async move { (id, pending.await) });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => return Err(err.into()),
            }
        }
        results.sort_by(|(left, _), (right, _)| left.cmp(right));
        Ok(results)
    }

    /// Stops any process still tracked for a failed item.
    async fn ensure_no_process(&self, id: &ItemId) -> ItemManagerResult<()> {
        match self.supervisor.stop(id, self.grace_period).await {
            Ok(outcome) => {
                debug!(item_id = %id, ?outcome, "no process left for failed item");
                Ok(())
            }
            Err(StopError::NotTracked(_)) => Ok(()),
            Err(source) => Err(ItemManagerError::Stop {
                id: id.clone(),
                source,
            }),
        }
    }

    /// Tears down a process whose running state could not be persisted.
    async fn abandon_spawn(&self, item: &mut Item) {
        let id = item.id().clone();
        warn!(item_id = %id, "could not record running item, stopping its process");
        if let Err(err) = self.supervisor.stop(&id, self.grace_period).await {
            warn!(item_id = %id, error = %err, "failed to stop abandoned process");
        }
        let recorded = item
            .mark_failed(&*self.clock)
            .map_err(ItemManagerError::from)
            .and_then(|()| self.store.save(item).map_err(ItemManagerError::from));
        if let Err(err) = recorded {
            warn!(item_id = %id, error = %err, "failed to record abandoned start");
        }
    }
}
