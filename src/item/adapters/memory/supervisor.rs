//! Scripted process supervisor for lifecycle tests.

use crate::item::{
    domain::{ItemId, ProcessId, ProcessStatus},
    ports::{
        PollError, ProcessSupervisor, SpawnError, SpawnRequest, StopError, StopOutcome,
        TrackedProcess,
    },
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// First pid handed out by the fake.
const FIRST_PID: u32 = 1000;

/// Signal number reported for processes stopped by the fake.
const TERMINATION_SIGNAL: i32 = 15;

/// In-memory process supervisor.
///
/// No OS process is ever created. Tests script exits, missing binaries, and
/// termination failures, then inspect how often termination was requested.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessSupervisor {
    state: Arc<Mutex<FakeSupervisorState>>,
}

#[derive(Debug, Default)]
struct FakeSupervisorState {
    next_pid: u32,
    processes: BTreeMap<ItemId, FakeProcess>,
    missing_binaries: HashSet<PathBuf>,
    failing_polls: HashSet<ItemId>,
    failing_stops: HashSet<ItemId>,
    terminate_calls: HashMap<ItemId, usize>,
}

#[derive(Debug, Clone, Copy)]
struct FakeProcess {
    pid: ProcessId,
    status: ProcessStatus,
}

impl InMemoryProcessSupervisor {
    /// Creates a supervisor with no tracked processes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes spawns of `executable` fail with [`SpawnError::BinaryMissing`].
    pub fn mark_missing(&self, executable: impl Into<PathBuf>) {
        self.lock().missing_binaries.insert(executable.into());
    }

    /// Scripts the exit of the process tracked for `id`.
    ///
    /// Returns `false` when no process is tracked.
    #[must_use]
    pub fn finish(&self, id: &ItemId, status: ProcessStatus) -> bool {
        self.lock()
            .processes
            .get_mut(id)
            .map(|process| process.status = status)
            .is_some()
    }

    /// Makes every poll of `id` fail with an I/O error.
    pub fn fail_poll(&self, id: ItemId) {
        self.lock().failing_polls.insert(id);
    }

    /// Makes every stop of `id` fail with [`StopError::TerminationFailed`].
    pub fn fail_stop(&self, id: ItemId) {
        self.lock().failing_stops.insert(id);
    }

    /// Returns how many termination signals were sent for `id`.
    #[must_use]
    pub fn terminate_calls(&self, id: &ItemId) -> usize {
        self.lock().terminate_calls.get(id).copied().unwrap_or(0)
    }

    /// Returns the pid tracked for `id`, live or not.
    #[must_use]
    pub fn pid_of(&self, id: &ItemId) -> Option<ProcessId> {
        self.lock().processes.get(id).map(|process| process.pid)
    }

    fn lock(&self) -> MutexGuard<'_, FakeSupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProcessSupervisor for InMemoryProcessSupervisor {
    async fn spawn(&self, request: SpawnRequest) -> Result<ProcessId, SpawnError> {
        let mut state = self.lock();
        let executable = request.command().executable();
        if state.missing_binaries.contains(executable) {
            return Err(SpawnError::BinaryMissing(executable.to_path_buf()));
        }

        if let Some(existing) = state.processes.get(request.id())
            && existing.status.is_running()
        {
            return Err(SpawnError::AlreadyRunning {
                id: request.id().clone(),
                pid: existing.pid,
            });
        }

        let raw_pid = FIRST_PID.saturating_add(state.next_pid);
        state.next_pid = state.next_pid.saturating_add(1);
        let pid = ProcessId::from_raw(raw_pid);
        state.processes.insert(
            request.id().clone(),
            FakeProcess {
                pid,
                status: ProcessStatus::Running,
            },
        );
        Ok(pid)
    }

    async fn poll(&self, id: &ItemId) -> Result<ProcessStatus, PollError> {
        let state = self.lock();
        if state.failing_polls.contains(id) {
            return Err(PollError::io(std::io::Error::other("scripted poll failure")));
        }

        state
            .processes
            .get(id)
            .map(|process| process.status)
            .ok_or_else(|| PollError::NotTracked(id.clone()))
    }

    async fn stop(&self, id: &ItemId, _grace_period: Duration) -> Result<StopOutcome, StopError> {
        let mut state = self.lock();
        if state.failing_stops.contains(id) {
            return Err(StopError::termination_failed(
                id.clone(),
                std::io::Error::other("scripted termination failure"),
            ));
        }

        let Some(process) = state.processes.get_mut(id) else {
            return Err(StopError::NotTracked(id.clone()));
        };
        if !process.status.is_running() {
            return Ok(StopOutcome::AlreadyExited(process.status));
        }

        process.status = ProcessStatus::Signaled(TERMINATION_SIGNAL);
        let status = process.status;
        *state.terminate_calls.entry(id.clone()).or_insert(0) += 1;
        Ok(StopOutcome::Graceful(status))
    }

    async fn tracked(&self) -> Vec<TrackedProcess> {
        self.lock()
            .processes
            .iter()
            .filter(|(_, process)| process.status.is_running())
            .map(|(id, process)| TrackedProcess {
                id: id.clone(),
                pid: process.pid,
            })
            .collect()
    }

    async fn release(&self, id: &ItemId) -> bool {
        let mut state = self.lock();
        if state
            .processes
            .get(id)
            .is_some_and(|process| process.status.is_running())
        {
            return false;
        }
        state.processes.remove(id);
        true
    }
}
