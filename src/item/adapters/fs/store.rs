//! Filesystem item store confined to a trusted root.

use super::record::{self, RecordError};
use crate::item::{
    domain::{Item, ItemId, NewItem},
    ports::{ItemStore, StoreError, StoreResult},
};
use crate::path_guard::{PathError, PathGuard, PathRequirement};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the record file inside each item directory.
pub const RECORD_FILE_NAME: &str = "item.json";

/// Sibling file a record is staged in before being renamed into place.
const STAGING_FILE_NAME: &str = ".item.json.tmp";

/// Item store keeping one directory per item under a storage root.
///
/// Every operation re-validates the root and the item directory through
/// [`PathGuard`] and then works through capability handles, so a link
/// planted inside the root cannot redirect reads or writes elsewhere.
#[derive(Debug, Clone)]
pub struct FsItemStore {
    guard: PathGuard,
}

impl FsItemStore {
    /// Creates a store rooted at `root`.
    ///
    /// The root must already exist when operations run.
    ///
    /// # Panics
    ///
    /// Panics when `root` is relative, as [`PathGuard::new`] does.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_guard(PathGuard::new(root))
    }

    /// Creates a store from an existing guard.
    #[must_use]
    pub const fn with_guard(guard: PathGuard) -> Self {
        Self { guard }
    }

    /// Returns the configured storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    fn open_root(&self) -> StoreResult<Dir> {
        let root = self.guard.resolved_root()?;
        Dir::open_ambient_dir(&root, ambient_authority()).map_err(StoreError::io)
    }

    /// Confirms that `id` names a real directory directly under the root.
    fn locate(&self, root: &Dir, id: &ItemId) -> StoreResult<()> {
        let path = match self
            .guard
            .validate_entry(id.as_str(), PathRequirement::MustExist)
        {
            Ok(path) => path,
            Err(PathError::NotFound(_)) => return Err(StoreError::NotFound(id.clone())),
            Err(err) => return Err(err.into()),
        };

        let metadata = root.symlink_metadata(id.as_str()).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(id.clone())
            } else {
                StoreError::io(err)
            }
        })?;
        if !metadata.is_dir() {
            return Err(PathError::NotADirectory(path).into());
        }
        Ok(())
    }

    fn read_item(root: &Dir, id: &ItemId) -> StoreResult<Item> {
        let dir = root.open_dir(id.as_str()).map_err(StoreError::io)?;
        let bytes = match dir.read(RECORD_FILE_NAME) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::corrupted(id.clone(), RecordError::Missing));
            }
            Err(err) => return Err(StoreError::io(err)),
        };
        record::decode(&bytes, id).map_err(|err| StoreError::corrupted(id.clone(), err))
    }

    fn write_item(root: &Dir, item: &Item) -> StoreResult<()> {
        let bytes = record::encode(item).map_err(StoreError::io)?;
        let dir = root.open_dir(item.id().as_str()).map_err(StoreError::io)?;
        write_atomically(&dir, &bytes).map_err(StoreError::io)?;
        debug!(item_id = %item.id(), state = %item.state(), "item record written");
        Ok(())
    }
}

/// Stages `bytes` in a sibling file, syncs it, and renames it over the
/// record.
fn write_atomically(dir: &Dir, bytes: &[u8]) -> io::Result<()> {
    let mut staging = dir.create(STAGING_FILE_NAME)?;
    staging.write_all(bytes)?;
    staging.sync_all()?;
    drop(staging);
    dir.rename(STAGING_FILE_NAME, dir, RECORD_FILE_NAME)
}

impl ItemStore for FsItemStore {
    fn create(&self, new_item: NewItem, created_at: DateTime<Utc>) -> StoreResult<Item> {
        let root = self.open_root()?;
        let name = new_item.id.as_str().to_owned();
        match root.symlink_metadata(&name) {
            Ok(_) => return Err(StoreError::AlreadyExists(new_item.id)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::io(err)),
        }

        let item = Item::create(new_item, created_at)?;
        self.guard
            .validate_entry(&name, PathRequirement::MayBeMissing)?;

        root.create_dir(&name).map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                StoreError::AlreadyExists(item.id().clone())
            } else {
                StoreError::io(err)
            }
        })?;

        if let Err(err) = Self::write_item(&root, &item) {
            if let Err(cleanup) = root.remove_dir_all(&name) {
                warn!(item_id = %item.id(), error = %cleanup, "failed to remove partial item directory");
            }
            return Err(err);
        }
        Ok(item)
    }

    fn load(&self, id: &ItemId) -> StoreResult<Item> {
        let root = self.open_root()?;
        self.locate(&root, id)?;
        Self::read_item(&root, id)
    }

    fn save(&self, item: &Item) -> StoreResult<()> {
        let root = self.open_root()?;
        self.locate(&root, item.id())?;
        Self::write_item(&root, item)
    }

    fn delete(&self, id: &ItemId) -> StoreResult<()> {
        let root = self.open_root()?;
        self.locate(&root, id)?;
        root.remove_dir_all(id.as_str()).map_err(StoreError::io)
    }

    fn list(&self) -> StoreResult<Vec<Item>> {
        let root = self.open_root()?;
        let mut items = Vec::new();
        for listing in root.entries().map_err(StoreError::io)? {
            let entry = listing.map_err(StoreError::io)?;
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| ItemId::new(name).ok())
            else {
                continue;
            };

            let loaded = self
                .locate(&root, &id)
                .and_then(|()| Self::read_item(&root, &id));
            match loaded {
                Ok(item) => items.push(item),
                Err(err @ (StoreError::Corrupted { .. } | StoreError::Unsafe(_))) => {
                    warn!(item_id = %id, error = %err, "skipping unreadable item record");
                }
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        items.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(items)
    }
}
