//! Identifier and validated-value types for items.

use super::ItemDomainError;
use std::fmt;

/// Maximum length for an item identifier.
const MAX_ITEM_ID_LENGTH: usize = 64;

/// Maximum length for an item name, in characters.
const MAX_ITEM_NAME_LENGTH: usize = 255;

/// Maximum length for an item version.
const MAX_VERSION_LENGTH: usize = 64;

/// Stable, filesystem-safe item identifier.
///
/// Identifiers double as directory names under the storage root, so they are
/// restricted to `[A-Za-z0-9._-]` and must start with an ASCII alphanumeric.
/// That rules out `.`, `..`, hidden entries, and path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a validated item identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDomainError`] when the identifier is empty, too long, or
    /// not filesystem-safe.
    pub fn new(value: impl Into<String>) -> Result<Self, ItemDomainError> {
        let raw = value.into();

        if raw.is_empty() {
            return Err(ItemDomainError::EmptyItemId);
        }

        if raw.len() > MAX_ITEM_ID_LENGTH {
            return Err(ItemDomainError::ItemIdTooLong(raw));
        }

        let starts_alphanumeric = raw
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphanumeric());
        let is_safe = raw.chars().all(|character| {
            character.is_ascii_alphanumeric() || matches!(character, '.' | '_' | '-')
        });
        if !starts_alphanumeric || !is_safe {
            return Err(ItemDomainError::InvalidItemId(raw));
        }

        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated human-readable item name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemName(String);

impl ItemName {
    /// Creates a validated item name.
    ///
    /// The input is trimmed. Names must be non-empty, at most 255 characters,
    /// free of path separators and control characters, and must not be a
    /// reserved device name.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, ItemDomainError> {
        let normalized = value.into().trim().to_owned();

        if normalized.is_empty() {
            return Err(ItemDomainError::EmptyItemName);
        }

        if normalized.chars().count() > MAX_ITEM_NAME_LENGTH {
            return Err(ItemDomainError::ItemNameTooLong(normalized));
        }

        let has_forbidden = normalized
            .chars()
            .any(|character| matches!(character, '/' | '\\') || character.is_control());
        if has_forbidden {
            return Err(ItemDomainError::InvalidItemName(normalized));
        }

        if is_reserved_device_name(&normalized) {
            return Err(ItemDomainError::ReservedItemName(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ItemName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Returns whether `name` collides with a reserved device name, with or
/// without an extension.
fn is_reserved_device_name(name: &str) -> bool {
    let stem = name
        .split('.')
        .next()
        .unwrap_or(name)
        .trim_end()
        .to_ascii_uppercase();

    if matches!(stem.as_str(), "CON" | "PRN" | "AUX" | "NUL") {
        return true;
    }

    ["COM", "LPT"].iter().any(|prefix| {
        stem.strip_prefix(prefix).is_some_and(|suffix| {
            suffix.len() == 1 && suffix.chars().all(|digit| ('1'..='9').contains(&digit))
        })
    })
}

/// Validated item version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemVersion(String);

impl ItemVersion {
    /// Creates a validated version.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDomainError::EmptyVersion`] when the value is blank and
    /// [`ItemDomainError::InvalidVersion`] when it contains whitespace or is
    /// longer than 64 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ItemDomainError> {
        let normalized = value.into().trim().to_owned();

        if normalized.is_empty() {
            return Err(ItemDomainError::EmptyVersion);
        }

        if normalized.len() > MAX_VERSION_LENGTH || normalized.chars().any(char::is_whitespace) {
            return Err(ItemDomainError::InvalidVersion(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated item homepage or download URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemUrl(String);

impl ItemUrl {
    /// Creates a validated URL.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDomainError::InvalidUrl`] when the trimmed value does
    /// not start with `http://` or `https://`.
    pub fn new(value: impl Into<String>) -> Result<Self, ItemDomainError> {
        let normalized = value.into().trim().to_owned();
        let has_valid_prefix =
            normalized.starts_with("http://") || normalized.starts_with("https://");
        if !has_valid_prefix {
            return Err(ItemDomainError::InvalidUrl(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Operating-system process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Wraps a raw OS process identifier.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw OS process identifier.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
