//! In-memory item store.

use crate::item::{
    domain::{Item, ItemId, NewItem},
    ports::{ItemStore, StoreError, StoreResult},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory item store.
///
/// Writes replace whole records under a single lock, so readers never see a
/// partially updated item.
#[derive(Debug, Clone, Default)]
pub struct InMemoryItemStore {
    items: Arc<RwLock<BTreeMap<ItemId, Item>>>,
}

impl InMemoryItemStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl std::fmt::Display) -> StoreError {
    StoreError::io(std::io::Error::other(err.to_string()))
}

impl ItemStore for InMemoryItemStore {
    fn create(&self, new_item: NewItem, created_at: DateTime<Utc>) -> StoreResult<Item> {
        let mut items = self.items.write().map_err(poisoned)?;
        if items.contains_key(&new_item.id) {
            return Err(StoreError::AlreadyExists(new_item.id));
        }

        let item = Item::create(new_item, created_at)?;
        items.insert(item.id().clone(), item.clone());
        Ok(item)
    }

    fn load(&self, id: &ItemId) -> StoreResult<Item> {
        let items = self.items.read().map_err(poisoned)?;
        items
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn save(&self, item: &Item) -> StoreResult<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        let slot = items
            .get_mut(item.id())
            .ok_or_else(|| StoreError::NotFound(item.id().clone()))?;
        *slot = item.clone();
        Ok(())
    }

    fn delete(&self, id: &ItemId) -> StoreResult<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn list(&self) -> StoreResult<Vec<Item>> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.values().cloned().collect())
    }
}
