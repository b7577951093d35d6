//! Filesystem adapter for item record persistence.
//!
//! Records live at `<root>/<id>/item.json` and are replaced atomically.

mod record;
mod store;

pub use store::{FsItemStore, RECORD_FILE_NAME};
