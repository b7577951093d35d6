//! Store port for item record persistence.

use crate::item::domain::{Item, ItemDomainError, ItemId, NewItem};
use crate::path_guard::PathError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for item store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Item record persistence contract.
///
/// Every write is atomic: readers observe either the previous record or the
/// new one, never a partial document.
pub trait ItemStore: Send + Sync {
    /// Validates and persists a new item in the `stopped` state.
    ///
    /// The collision check runs before any field validation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the id is taken,
    /// [`StoreError::InvalidName`] or [`StoreError::InvalidField`] when the
    /// request is malformed, and [`StoreError::Unsafe`] when the item path
    /// fails confinement.
    fn create(&self, new_item: NewItem, created_at: DateTime<Utc>) -> StoreResult<Item>;

    /// Loads an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the item is absent and
    /// [`StoreError::Corrupted`] when the record fails schema parsing.
    fn load(&self, id: &ItemId) -> StoreResult<Item>;

    /// Replaces the record of an existing item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the item was never created.
    fn save(&self, item: &Item) -> StoreResult<()>;

    /// Removes an item and all of its stored data.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the item is absent.
    fn delete(&self, id: &ItemId) -> StoreResult<()>;

    /// Returns every readable item, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsafe`] or [`StoreError::Io`] when the storage
    /// root itself cannot be read.
    fn list(&self) -> StoreResult<Vec<Item>>;
}

/// Errors returned by item store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// An item with the same identifier already exists.
    #[error("item already exists: {0}")]
    AlreadyExists(ItemId),

    /// The item was not found.
    #[error("item not found: {0}")]
    NotFound(ItemId),

    /// The requested item name is invalid.
    #[error("invalid item name: {0}")]
    InvalidName(ItemDomainError),

    /// Another requested field is invalid.
    #[error("invalid item field: {0}")]
    InvalidField(ItemDomainError),

    /// The stored record could not be parsed.
    #[error("item {id} record is corrupted: {reason}")]
    Corrupted {
        /// Item whose record is unreadable.
        id: ItemId,
        /// Parsing or validation failure.
        reason: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The item path failed confinement checks.
    #[error(transparent)]
    Unsafe(#[from] PathError),

    /// Storage-layer I/O failure.
    #[error("storage error: {0}")]
    Io(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a storage-layer failure.
    pub fn io(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Io(Arc::new(err))
    }

    /// Wraps a record parsing failure for `id`.
    pub fn corrupted(id: ItemId, reason: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Corrupted {
            id,
            reason: Arc::new(reason),
        }
    }
}

impl From<ItemDomainError> for StoreError {
    fn from(err: ItemDomainError) -> Self {
        if err.is_name_error() {
            Self::InvalidName(err)
        } else {
            Self::InvalidField(err)
        }
    }
}
