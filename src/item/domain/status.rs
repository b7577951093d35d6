//! Observed process status.

use std::fmt;

/// Status of an item's process as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
    /// The process is alive.
    Running,
    /// The process exited with the given code.
    Exited(i32),
    /// The process was terminated by the given signal and has no exit code.
    Signaled(i32),
    /// The process is gone and its exit status could not be reaped.
    Unknown,
}

impl ProcessStatus {
    /// Returns whether the process is still alive.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns whether the process exited with code zero.
    #[must_use]
    pub const fn is_clean_exit(self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => formatter.write_str("running"),
            Self::Exited(code) => write!(formatter, "exited with code {code}"),
            Self::Signaled(signal) => write!(formatter, "terminated by signal {signal}"),
            Self::Unknown => formatter.write_str("unknown"),
        }
    }
}
