//! Item manager configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Grace period applied when none is configured, in milliseconds.
const DEFAULT_GRACE_PERIOD_MS: u64 = 5000;

/// Grace period applied when none is configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(DEFAULT_GRACE_PERIOD_MS);

/// Errors returned while building an [`ItemManagerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid item manager configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The storage root is not an absolute path.
    #[error("storage root must be absolute, got {}", .0.display())]
    RelativeRoot(PathBuf),
}

/// Settings for an item manager.
///
/// # Examples
///
/// ```
/// use itemkeeper::item::services::ItemManagerConfig;
/// use std::time::Duration;
///
/// let config = ItemManagerConfig::from_json(r#"{"root": "/var/lib/items", "grace_period": 250}"#)
///     .expect("valid configuration");
/// assert_eq!(config.grace_period(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemManagerConfig {
    root: PathBuf,
    grace_period: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    root: PathBuf,
    #[serde(default = "default_grace_period_ms")]
    grace_period: u64,
}

const fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

impl ItemManagerConfig {
    /// Creates a configuration for `root` with the default grace period.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelativeRoot`] when `root` is relative.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root_path = root.into();
        if !root_path.is_absolute() {
            return Err(ConfigError::RelativeRoot(root_path));
        }

        Ok(Self {
            root: root_path,
            grace_period: DEFAULT_GRACE_PERIOD,
        })
    }

    /// Parses a JSON document of the form
    /// `{"root": "/abs/path", "grace_period": <milliseconds>}`.
    ///
    /// `grace_period` is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::RelativeRoot`] when the root is relative.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let parsed: ConfigDocument = serde_json::from_str(document)?;
        Ok(Self::new(parsed.root)?.with_grace_period(Duration::from_millis(parsed.grace_period)))
    }

    /// Sets the grace period between a termination request and a forced
    /// kill.
    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the grace period.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }
}
