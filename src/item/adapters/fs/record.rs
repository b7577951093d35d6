//! On-disk JSON record for a single item.

use crate::item::domain::{
    Item, ItemDomainError, ItemId, ItemName, ItemState, ItemUrl, ItemVersion, LaunchCommand,
    LifecycleFault, ParseItemStateError, PersistedItemData, ProcessId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding a stored record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record file is absent from the item directory.
    #[error("record file is missing")]
    Missing,

    /// The document is not valid JSON for the record schema.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The stored id does not match the directory name.
    #[error("record id '{found}' does not match directory '{expected}'")]
    IdMismatch {
        /// Directory name.
        expected: ItemId,
        /// Id found in the record.
        found: String,
    },

    /// A stored field failed domain validation.
    #[error(transparent)]
    InvalidField(#[from] ItemDomainError),

    /// The stored state is not a known lifecycle state.
    #[error(transparent)]
    InvalidState(#[from] ParseItemStateError),

    /// The stored pid disagrees with the stored state.
    #[error(transparent)]
    Invariant(#[from] LifecycleFault),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemRecord {
    id: String,
    name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<CommandRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandRecord {
    executable: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_directory: Option<PathBuf>,
}

impl From<&LaunchCommand> for CommandRecord {
    fn from(command: &LaunchCommand) -> Self {
        Self {
            executable: command.executable().to_path_buf(),
            args: command.args().to_vec(),
            env: command.env().clone(),
            working_directory: command.working_directory().map(PathBuf::from),
        }
    }
}

impl TryFrom<CommandRecord> for LaunchCommand {
    type Error = ItemDomainError;

    fn try_from(record: CommandRecord) -> Result<Self, Self::Error> {
        let mut command = Self::new(record.executable)?
            .with_args(record.args)
            .with_env(record.env);
        if let Some(directory) = record.working_directory {
            command = command.with_working_directory(directory);
        }
        Ok(command)
    }
}

impl From<&Item> for ItemRecord {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id().as_str().to_owned(),
            name: item.name().as_str().to_owned(),
            version: item.version().as_str().to_owned(),
            url: item.url().map(|url| url.as_str().to_owned()),
            command: item.command().map(CommandRecord::from),
            pid: item.pid().map(ProcessId::as_u32),
            state: item.state().as_str().to_owned(),
            created_at: item.created_at(),
            updated_at: item.updated_at(),
        }
    }
}

/// Serializes `item` into its stored JSON form.
pub fn encode(item: &Item) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(&ItemRecord::from(item))
}

/// Parses and validates a stored record for the item directory `expected`.
pub fn decode(bytes: &[u8], expected: &ItemId) -> Result<Item, RecordError> {
    let record: ItemRecord = serde_json::from_slice(bytes)?;
    if record.id != expected.as_str() {
        return Err(RecordError::IdMismatch {
            expected: expected.clone(),
            found: record.id,
        });
    }

    let data = PersistedItemData {
        id: expected.clone(),
        name: ItemName::new(record.name)?,
        version: ItemVersion::new(record.version)?,
        url: record.url.map(ItemUrl::new).transpose()?,
        command: record.command.map(LaunchCommand::try_from).transpose()?,
        pid: record.pid.map(ProcessId::from_raw),
        state: ItemState::try_from(record.state.as_str())?,
        created_at: record.created_at,
        updated_at: record.updated_at,
    };
    Ok(Item::from_persisted(data)?)
}
