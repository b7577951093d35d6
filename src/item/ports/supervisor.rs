//! Supervisor port for spawning, observing, and terminating item processes.

use crate::item::domain::{ItemId, LaunchCommand, ProcessId, ProcessStatus};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Request to spawn the process for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    id: ItemId,
    command: LaunchCommand,
}

impl SpawnRequest {
    /// Creates a spawn request.
    #[must_use]
    pub const fn new(id: ItemId, command: LaunchCommand) -> Self {
        Self { id, command }
    }

    /// Returns the item identifier.
    #[must_use]
    pub const fn id(&self) -> &ItemId {
        &self.id
    }

    /// Returns the launch command.
    #[must_use]
    pub const fn command(&self) -> &LaunchCommand {
        &self.command
    }
}

/// How a stop request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited within the grace period.
    Graceful(ProcessStatus),
    /// The process outlived the grace period and was killed.
    Forced(ProcessStatus),
    /// The process had already exited. No signal was sent.
    AlreadyExited(ProcessStatus),
}

impl StopOutcome {
    /// Returns the final process status.
    #[must_use]
    pub const fn status(self) -> ProcessStatus {
        match self {
            Self::Graceful(status) | Self::Forced(status) | Self::AlreadyExited(status) => status,
        }
    }
}

/// Snapshot entry for a live supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    /// Item identifier.
    pub id: ItemId,
    /// Process identifier.
    pub pid: ProcessId,
}

/// Process supervision contract.
///
/// A supervisor exclusively owns the OS handle of every process it spawns.
/// Operations on one id are serialized. Operations on distinct ids proceed
/// independently.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Spawns the process described by `request`.
    ///
    /// Returns once the OS has assigned a pid. Standard streams are detached
    /// and arguments reach the executable without shell interpretation.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::BinaryMissing`] when the executable does not
    /// exist and [`SpawnError::AlreadyRunning`] when a live process is
    /// already tracked for the id.
    async fn spawn(&self, request: SpawnRequest) -> Result<ProcessId, SpawnError>;

    /// Observes the status of the process tracked for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::NotTracked`] for ids this supervisor never
    /// spawned.
    async fn poll(&self, id: &ItemId) -> Result<ProcessStatus, PollError>;

    /// Terminates the process tracked for `id`.
    ///
    /// Requests graceful termination, waits up to `grace_period`, then
    /// forces termination. Dropping the returned future during the wait
    /// forces termination immediately. Stopping a process that already
    /// exited returns [`StopOutcome::AlreadyExited`].
    ///
    /// # Errors
    ///
    /// Returns [`StopError::NotTracked`] for ids this supervisor never
    /// spawned and [`StopError::TerminationFailed`] when the process cannot
    /// be signalled or reaped.
    async fn stop(&self, id: &ItemId, grace_period: Duration) -> Result<StopOutcome, StopError>;

    /// Returns the live processes, sorted by id.
    async fn tracked(&self) -> Vec<TrackedProcess>;

    /// Forgets everything recorded for `id` unless its process is still
    /// alive. Returns whether the id was forgotten.
    ///
    /// Callers must not race this with a spawn for the same id.
    async fn release(&self, id: &ItemId) -> bool;
}

/// Errors returned while spawning a process.
#[derive(Debug, Clone, Error)]
pub enum SpawnError {
    /// The executable does not exist.
    #[error("executable not found: {}", .0.display())]
    BinaryMissing(PathBuf),

    /// A live process is already tracked for the item.
    #[error("item {id} already has a running process with pid {pid}")]
    AlreadyRunning {
        /// Item identifier.
        id: ItemId,
        /// Pid of the live process.
        pid: ProcessId,
    },

    /// Process creation failed.
    #[error("failed to spawn process: {0}")]
    Io(Arc<io::Error>),
}

impl SpawnError {
    /// Wraps a process creation failure.
    #[must_use]
    pub fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Errors returned while polling a process.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    /// No process was ever spawned for the item.
    #[error("no process tracked for item {0}")]
    NotTracked(ItemId),

    /// Querying the process failed.
    #[error("failed to poll process: {0}")]
    Io(Arc<io::Error>),
}

impl PollError {
    /// Wraps a process query failure.
    #[must_use]
    pub fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Errors returned while stopping a process.
#[derive(Debug, Clone, Error)]
pub enum StopError {
    /// No process was ever spawned for the item.
    #[error("no process tracked for item {0}")]
    NotTracked(ItemId),

    /// The process could not be signalled or reaped.
    #[error("failed to terminate process for item {id}: {reason}")]
    TerminationFailed {
        /// Item identifier.
        id: ItemId,
        /// Signal delivery or reaping failure.
        reason: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl StopError {
    /// Wraps a termination failure for `id`.
    pub fn termination_failed(
        id: ItemId,
        reason: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TerminationFailed {
            id,
            reason: Arc::new(reason),
        }
    }
}
