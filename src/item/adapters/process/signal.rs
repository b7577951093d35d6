//! Platform glue for terminating and classifying child processes.

use crate::item::domain::{ProcessId, ProcessStatus};
use std::io;
use std::process::ExitStatus;
use tokio::process::Child;
use tracing::warn;

/// Sends SIGKILL to a process when dropped while armed.
///
/// Armed for the duration of a stop. If the stopping future is cancelled
/// during the grace wait, the drop kills the process immediately. The child
/// is still owned by its slot and unreaped at that point, so the pid cannot
/// have been recycled.
#[derive(Debug)]
pub(super) struct ForceKillOnDrop {
    pid: Option<ProcessId>,
}

impl ForceKillOnDrop {
    pub(super) const fn arm(pid: ProcessId) -> Self {
        Self { pid: Some(pid) }
    }

    /// Disarms the guard once the process has been reaped.
    pub(super) const fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for ForceKillOnDrop {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            warn!(%pid, "stop abandoned mid-wait, sending SIGKILL");
            force_kill(pid);
        }
    }
}

/// Asks the process to exit. A process that is already gone is not an
/// error.
#[cfg(unix)]
pub(super) fn request_termination(_child: &mut Child, pid: ProcessId) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};

    match kill(raw_pid(pid)?, Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Without POSIX signals there is no graceful request, so termination is
/// forced straight away.
#[cfg(not(unix))]
pub(super) fn request_termination(child: &mut Child, _pid: ProcessId) -> io::Result<()> {
    child.start_kill()
}

#[cfg(unix)]
fn force_kill(pid: ProcessId) {
    use nix::sys::signal::{Signal, kill};

    let result = raw_pid(pid).and_then(|target| kill(target, Signal::SIGKILL).map_err(io::Error::from));
    if let Err(err) = result {
        warn!(%pid, error = %err, "SIGKILL delivery failed");
    }
}

#[cfg(not(unix))]
const fn force_kill(_pid: ProcessId) {}

#[cfg(unix)]
fn raw_pid(pid: ProcessId) -> io::Result<nix::unistd::Pid> {
    i32::try_from(pid.as_u32())
        .map(nix::unistd::Pid::from_raw)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
}

/// Maps an OS exit status onto [`ProcessStatus`].
pub(super) fn status_from_exit(exit: ExitStatus) -> ProcessStatus {
    if let Some(code) = exit.code() {
        return ProcessStatus::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = exit.signal() {
            return ProcessStatus::Signaled(signal);
        }
    }

    ProcessStatus::Unknown
}

/// Returns whether a wait failed because someone else reaped the child.
pub(super) fn is_already_reaped(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::ECHILD as i32)
    }

    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}
