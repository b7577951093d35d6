//! Per-item async lock registry.

use crate::item::domain::ItemId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type ItemLock = Arc<AsyncMutex<()>>;

/// Serializes operations on one item id.
///
/// An entry lives only while some caller holds or waits for it. Waiters
/// clone the entry under the registry mutex, so an entry is never pruned
/// while another caller still needs it.
#[derive(Debug, Default)]
pub(super) struct ItemLocks {
    entries: Mutex<HashMap<ItemId, ItemLock>>,
}

/// Exclusive access to one item id. Dropping it releases the id and prunes
/// the registry entry when nobody is waiting.
#[derive(Debug)]
pub(super) struct ItemLockGuard<'registry> {
    registry: &'registry ItemLocks,
    id: ItemId,
    held: OwnedMutexGuard<()>,
}

impl ItemLocks {
    /// Waits for exclusive access to `id`.
    pub(super) async fn acquire(&self, id: &ItemId) -> ItemLockGuard<'_> {
        let lock = Arc::clone(self.entries().entry(id.clone()).or_default());
        ItemLockGuard {
            registry: self,
            id: id.clone(),
            held: lock.lock_owned().await,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ItemId, ItemLock>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

impl Drop for ItemLockGuard<'_> {
    fn drop(&mut self) {
        let mut entries = self.registry.entries();
        let idle = entries.get(&self.id).is_some_and(|entry| {
            Arc::ptr_eq(entry, OwnedMutexGuard::mutex(&self.held)) && Arc::strong_count(entry) == 2
        });
        if idle {
            entries.remove(&self.id);
        }
    }
}
