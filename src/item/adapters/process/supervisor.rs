//! Supervisor spawning real OS processes through `tokio::process`.

use super::signal::{self, ForceKillOnDrop};
use crate::item::{
    domain::{ItemId, LaunchCommand, ProcessId, ProcessStatus},
    ports::{
        PollError, ProcessSupervisor, SpawnError, SpawnRequest, StopError, StopOutcome,
        TrackedProcess,
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

type SlotHandle = Arc<AsyncMutex<Slot>>;

/// Process supervisor backed by `tokio::process`.
///
/// The id-to-slot map sits behind a short-held synchronous lock that is never
/// held across an await. Each slot has its own async lock, held for the
/// whole of a spawn, poll, or stop on that id.
///
/// Children are spawned with `kill_on_drop(false)`. Dropping the supervisor
/// leaves live processes running, so embedders stop them first.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessSupervisor {
    slots: Arc<Mutex<HashMap<ItemId, SlotHandle>>>,
}

#[derive(Debug)]
enum Slot {
    Vacant,
    Live { child: Child, pid: ProcessId },
    Finished { pid: ProcessId, status: ProcessStatus },
}

impl Slot {
    /// Reaps the child if it has exited and returns the current status.
    ///
    /// Returns `None` when nothing was ever spawned into the slot.
    fn refresh(&mut self) -> io::Result<Option<ProcessStatus>> {
        let (pid, status) = match self {
            Self::Vacant => return Ok(None),
            Self::Finished { status, .. } => return Ok(Some(*status)),
            Self::Live { child, pid } => {
                let status = match child.try_wait() {
                    Ok(None) => return Ok(Some(ProcessStatus::Running)),
                    Ok(Some(exit)) => signal::status_from_exit(exit),
                    Err(err) if signal::is_already_reaped(&err) => ProcessStatus::Unknown,
                    Err(err) => return Err(err),
                };
                (*pid, status)
            }
        };

        *self = Self::Finished { pid, status };
        Ok(Some(status))
    }

    const fn live_pid(&self) -> Option<ProcessId> {
        match self {
            Self::Live { pid, .. } => Some(*pid),
            Self::Vacant | Self::Finished { .. } => None,
        }
    }
}

impl TokioProcessSupervisor {
    /// Creates a supervisor with no tracked processes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ItemId, SlotHandle>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot_for_spawn(&self, id: &ItemId) -> SlotHandle {
        Arc::clone(
            self.slots()
                .entry(id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(Slot::Vacant))),
        )
    }

    fn existing_slot(&self, id: &ItemId) -> Option<SlotHandle> {
        self.slots().get(id).map(Arc::clone)
    }
}

/// Builds the OS command with detached standard streams and no shell.
fn build_command(launch: &LaunchCommand) -> Command {
    let mut command = Command::new(launch.executable());
    command
        .args(launch.args())
        .envs(launch.env())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);
    if let Some(directory) = launch.working_directory() {
        command.current_dir(directory);
    }
    command
}

/// Checks the working directory up front, so a `NotFound` from the spawn
/// itself can only mean the executable is missing.
async fn check_working_directory(launch: &LaunchCommand) -> Result<(), SpawnError> {
    let Some(directory) = launch.working_directory() else {
        return Ok(());
    };
    tokio::fs::metadata(directory)
        .await
        .map(drop)
        .map_err(|err| {
            SpawnError::io(io::Error::new(
                err.kind(),
                format!("working directory {}: {err}", directory.display()),
            ))
        })
}

/// Signals the child, waits out the grace period, then escalates.
async fn terminate(
    id: &ItemId,
    child: &mut Child,
    pid: ProcessId,
    grace_period: Duration,
) -> Result<StopOutcome, StopError> {
    let mut force_kill = ForceKillOnDrop::arm(pid);
    signal::request_termination(child, pid)
        .map_err(|err| StopError::termination_failed(id.clone(), err))?;

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(Ok(exit)) => {
            force_kill.disarm();
            let status = signal::status_from_exit(exit);
            info!(item_id = %id, %pid, %status, "item process exited after termination request");
            return Ok(StopOutcome::Graceful(status));
        }
        Ok(Err(err)) if signal::is_already_reaped(&err) => {
            force_kill.disarm();
            return Ok(StopOutcome::Graceful(ProcessStatus::Unknown));
        }
        Ok(Err(err)) => return Err(StopError::termination_failed(id.clone(), err)),
        Err(_elapsed) => {}
    }

    warn!(
        item_id = %id,
        %pid,
        grace_ms = grace_period.as_millis(),
        "grace period elapsed, forcing termination"
    );
    child
        .start_kill()
        .map_err(|err| StopError::termination_failed(id.clone(), err))?;
    let status = match child.wait().await {
        Ok(exit) => signal::status_from_exit(exit),
        Err(err) if signal::is_already_reaped(&err) => ProcessStatus::Unknown,
        Err(err) => return Err(StopError::termination_failed(id.clone(), err)),
    };
    force_kill.disarm();
    info!(item_id = %id, %pid, %status, "item process killed");
    Ok(StopOutcome::Forced(status))
}

#[async_trait]
impl ProcessSupervisor for TokioProcessSupervisor {
    async fn spawn(&self, request: SpawnRequest) -> Result<ProcessId, SpawnError> {
        let slot = self.slot_for_spawn(request.id());
        let mut guard = slot.lock().await;
        if let Some(ProcessStatus::Running) = guard.refresh().map_err(SpawnError::io)?
            && let Some(pid) = guard.live_pid()
        {
            return Err(SpawnError::AlreadyRunning {
                id: request.id().clone(),
                pid,
            });
        }

        let launch = request.command();
        check_working_directory(launch).await?;
        let child = build_command(launch).spawn().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                SpawnError::BinaryMissing(launch.executable().to_path_buf())
            } else {
                SpawnError::io(err)
            }
        })?;
        let raw_pid = child
            .id()
            .ok_or_else(|| SpawnError::io(io::Error::other("spawned process has no pid")))?;
        let pid = ProcessId::from_raw(raw_pid);

        *guard = Slot::Live { child, pid };
        info!(item_id = %request.id(), %pid, executable = %launch.executable().display(), "item process spawned");
        Ok(pid)
    }

    async fn poll(&self, id: &ItemId) -> Result<ProcessStatus, PollError> {
        let slot = self
            .existing_slot(id)
            .ok_or_else(|| PollError::NotTracked(id.clone()))?;
        let mut guard = slot.lock().await;
        let status = guard
            .refresh()
            .map_err(PollError::io)?
            .ok_or_else(|| PollError::NotTracked(id.clone()))?;
        debug!(item_id = %id, %status, "item process polled");
        Ok(status)
    }

    async fn stop(&self, id: &ItemId, grace_period: Duration) -> Result<StopOutcome, StopError> {
        let slot = self
            .existing_slot(id)
            .ok_or_else(|| StopError::NotTracked(id.clone()))?;
        let mut guard = slot.lock().await;
        let current = guard
            .refresh()
            .map_err(|err| StopError::termination_failed(id.clone(), err))?
            .ok_or_else(|| StopError::NotTracked(id.clone()))?;

        let Slot::Live { child, pid } = &mut *guard else {
            return Ok(StopOutcome::AlreadyExited(current));
        };
        let pid_value = *pid;
        let outcome = terminate(id, child, pid_value, grace_period).await?;
        *guard = Slot::Finished {
            pid: pid_value,
            status: outcome.status(),
        };
        Ok(outcome)
    }

    async fn tracked(&self) -> Vec<TrackedProcess> {
        let snapshot: Vec<(ItemId, SlotHandle)> = self
            .slots()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut live = Vec::new();
        for (id, slot) in snapshot {
            let mut guard = slot.lock().await;
            if matches!(guard.refresh(), Ok(Some(ProcessStatus::Running)))
                && let Some(pid) = guard.live_pid()
            {
                live.push(TrackedProcess { id, pid });
            }
        }
        live.sort_by(|left, right| left.id.cmp(&right.id));
        live
    }

    async fn release(&self, id: &ItemId) -> bool {
        let Some(slot) = self.existing_slot(id) else {
            return true;
        };
        let mut guard = slot.lock().await;
        if matches!(guard.refresh(), Ok(Some(ProcessStatus::Running))) {
            return false;
        }

        let mut slots = self.slots();
        if slots
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            slots.remove(id);
        }
        debug!(item_id = %id, "process slot released");
        true
    }
}
