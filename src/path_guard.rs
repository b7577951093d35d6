//! Confinement of item storage paths to a trusted root.
//!
//! [`PathGuard`] resolves symlinks on both the root and the candidate on every
//! call and rejects anything that does not land strictly inside the root.
//! Nothing is cached between calls, so a validated path is only trustworthy
//! for the operation that asked for it.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Existence requirement a caller places on a validated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRequirement {
    /// The candidate must already exist.
    MustExist,
    /// The candidate may be absent. Its deepest existing ancestor is resolved
    /// and the missing tail is appended verbatim.
    MayBeMissing,
}

/// Errors returned while validating a storage path.
#[derive(Debug, Clone, Error)]
pub enum PathError {
    /// The candidate resolves outside the storage root, is the root itself,
    /// or passes through a link that cannot be verified.
    #[error("path {} escapes storage root {}", .candidate.display(), .root.display())]
    PathEscape {
        /// Resolved storage root.
        root: PathBuf,
        /// Candidate path as supplied, joined onto the root.
        candidate: PathBuf,
    },

    /// A direct root entry resolves somewhere other than its literal location.
    #[error("path {} is redirected to {}", .candidate.display(), .resolved.display())]
    Redirected {
        /// Literal entry path.
        candidate: PathBuf,
        /// Location the entry resolves to.
        resolved: PathBuf,
    },

    /// The path does not exist.
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is not a real directory.
    #[error("path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Resolving the path failed for a reason other than absence.
    #[error("failed to resolve {}: {source}", .path.display())]
    Io {
        /// Path being resolved.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
}

impl PathError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(path.to_path_buf());
        }
        Self::Io {
            path: path.to_path_buf(),
            source: Arc::new(err),
        }
    }
}

/// Validates candidate paths against a trusted storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for `root`.
    ///
    /// # Panics
    ///
    /// Panics when `root` is relative. A relative storage root is a
    /// programming error in the embedding application and is never reported
    /// through the `Result` channel.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root_path = root.into();
        assert!(
            root_path.is_absolute(),
            "storage root must be absolute, got {}",
            root_path.display()
        );
        Self { root: root_path }
    }

    /// Returns the root as configured, without resolving it.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the storage root.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::NotFound`] when the root is missing and
    /// [`PathError::Io`] for other resolution failures.
    pub fn resolved_root(&self) -> Result<PathBuf, PathError> {
        fs::canonicalize(&self.root).map_err(|err| PathError::from_io(&self.root, err))
    }

    /// Validates `candidate` and returns its resolved absolute path.
    ///
    /// Relative candidates are interpreted against the root. The resolved
    /// path must be a strict descendant of the resolved root.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::PathEscape`] when the candidate resolves outside
    /// the root, [`PathError::NotFound`] when it is absent under
    /// [`PathRequirement::MustExist`], and [`PathError::Io`] for other
    /// resolution failures.
    pub fn validate(
        &self,
        candidate: &Path,
        requirement: PathRequirement,
    ) -> Result<PathBuf, PathError> {
        let resolved_root = self.resolved_root()?;
        let joined = self.root.join(candidate);
        let resolved = match requirement {
            PathRequirement::MustExist => {
                fs::canonicalize(&joined).map_err(|err| PathError::from_io(&joined, err))?
            }
            PathRequirement::MayBeMissing => resolve_allowing_missing(&joined, &resolved_root)?,
        };

        if resolved == resolved_root || !resolved.starts_with(&resolved_root) {
            return Err(PathError::PathEscape {
                root: resolved_root,
                candidate: joined,
            });
        }
        Ok(resolved)
    }

    /// Validates a direct entry of the root, such as an item directory.
    ///
    /// On top of [`Self::validate`], the entry must resolve to exactly
    /// `<resolved root>/<name>`, which rules out symlinked entries even when
    /// they point back inside the root.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::validate`] and
    /// [`PathError::Redirected`] when the entry is reached through a link.
    pub fn validate_entry(
        &self,
        name: &str,
        requirement: PathRequirement,
    ) -> Result<PathBuf, PathError> {
        let resolved = self.validate(Path::new(name), requirement)?;
        let expected = self.resolved_root()?.join(name);
        if resolved != expected {
            return Err(PathError::Redirected {
                candidate: expected,
                resolved,
            });
        }
        Ok(resolved)
    }
}

/// Resolves the deepest existing ancestor of `joined` and re-appends the
/// missing tail. Tail components must be plain names, and a dangling link
/// anywhere in the tail is treated as an escape.
fn resolve_allowing_missing(joined: &Path, resolved_root: &Path) -> Result<PathBuf, PathError> {
    let escape = || PathError::PathEscape {
        root: resolved_root.to_path_buf(),
        candidate: joined.to_path_buf(),
    };

    let mut missing: Vec<OsString> = Vec::new();
    let mut cursor = joined;
    loop {
        match fs::canonicalize(cursor) {
            Ok(base) => {
                let mut resolved = base;
                for component in missing.iter().rev() {
                    resolved.push(component);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(cursor).is_ok() {
                    return Err(escape());
                }
                let (Some(name), Some(parent)) = (cursor.file_name(), cursor.parent()) else {
                    return Err(escape());
                };
                missing.push(name.to_os_string());
                cursor = parent;
            }
            Err(err) => return Err(PathError::from_io(cursor, err)),
        }
    }
}
