//! Error types for item domain validation, parsing, and lifecycle faults.

use super::{ItemId, ItemState, LifecycleOperation};
use thiserror::Error;

/// Errors returned while constructing item domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemDomainError {
    /// The item identifier is empty.
    #[error("item id must not be empty")]
    EmptyItemId,

    /// The item identifier contains characters outside `[A-Za-z0-9._-]` or
    /// does not start with an ASCII alphanumeric.
    #[error(
        "item id '{0}' is not filesystem-safe (start with a letter or digit, then use letters, digits, '.', '_' or '-')"
    )]
    InvalidItemId(String),

    /// The item identifier exceeds the 64-character limit.
    #[error("item id exceeds 64 character limit: {0}")]
    ItemIdTooLong(String),

    /// The item name is empty after trimming.
    #[error("item name must not be empty")]
    EmptyItemName,

    /// The item name exceeds the 255-character limit.
    #[error("item name exceeds 255 character limit: {0}")]
    ItemNameTooLong(String),

    /// The item name contains a path separator or control character.
    #[error("item name '{0}' contains a path separator or control character")]
    InvalidItemName(String),

    /// The item name is a reserved device name such as `CON` or `LPT1`.
    #[error("item name '{0}' is a reserved device name")]
    ReservedItemName(String),

    /// The version is empty after trimming.
    #[error("item version must not be empty")]
    EmptyVersion,

    /// The version contains whitespace or exceeds 64 characters.
    #[error("invalid item version '{0}'")]
    InvalidVersion(String),

    /// The URL does not have an `http://` or `https://` prefix.
    #[error("item url '{0}' must start with 'http://' or 'https://'")]
    InvalidUrl(String),

    /// The launch command executable is empty.
    #[error("launch command executable must not be empty")]
    EmptyExecutable,
}

impl ItemDomainError {
    /// Returns whether the error concerns the item name.
    #[must_use]
    pub const fn is_name_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyItemName
                | Self::ItemNameTooLong(_)
                | Self::InvalidItemName(_)
                | Self::ReservedItemName(_)
        )
    }
}

/// Error returned while parsing item state from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown item state: {0}")]
pub struct ParseItemStateError(pub String);

/// Programming faults in the item lifecycle.
///
/// A fault means the caller or the implementation broke a contract. Faults
/// are surfaced immediately and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleFault {
    /// The requested operation is not valid from the current state.
    #[error("cannot {operation} item {id} while it is {state}")]
    InvalidTransition {
        /// Item identifier.
        id: ItemId,
        /// Requested operation.
        operation: LifecycleOperation,
        /// State the item was in.
        state: ItemState,
    },

    /// The item broke one of its structural invariants.
    #[error("item {id} violates lifecycle invariant: {detail}")]
    InvariantViolation {
        /// Item identifier.
        id: ItemId,
        /// Description of the broken invariant.
        detail: String,
    },
}
