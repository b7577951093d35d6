//! Launch command value object.

use super::ItemDomainError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Executable and argument vector used to start an item's process.
///
/// Arguments are kept as a discrete vector and handed to the OS unchanged.
/// No command interpreter ever sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    executable: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_directory: Option<PathBuf>,
}

impl LaunchCommand {
    /// Creates a launch command for `executable`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDomainError::EmptyExecutable`] when `executable` is
    /// empty.
    pub fn new(executable: impl Into<PathBuf>) -> Result<Self, ItemDomainError> {
        let path = executable.into();
        if path.as_os_str().is_empty() {
            return Err(ItemDomainError::EmptyExecutable);
        }

        Ok(Self {
            executable: path,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
        })
    }

    /// Replaces the argument vector.
    #[must_use]
    pub fn with_args<I, A>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = values.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces process environment overrides.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Sets an explicit working directory.
    #[must_use]
    pub fn with_working_directory(mut self, value: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(value.into());
        self
    }

    /// Returns the executable path.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Returns the argument vector.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns environment overrides.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the optional working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }
}
