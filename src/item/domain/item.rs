//! Item aggregate root and lifecycle state machine.

use super::{
    ItemDomainError, ItemId, ItemName, ItemUrl, ItemVersion, LaunchCommand, LifecycleFault,
    ParseItemStateError, ProcessId, ProcessStatus,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::fmt;

/// Item lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// No process is running. Initial state.
    Stopped,
    /// A spawn has been requested but no pid is known yet.
    Starting,
    /// The item's process is alive.
    Running,
    /// A graceful stop has been requested and has not been observed yet.
    Stopping,
    /// The last lifecycle operation failed. Left only by an explicit reset
    /// or a new start.
    Failed,
}

impl ItemState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }

    /// Returns whether items in this state carry a process id.
    #[must_use]
    pub const fn holds_pid(self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    /// Returns whether a process may exist for items in this state.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Returns whether items in this state may be deleted.
    #[must_use]
    pub const fn is_deletable(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Returns whether the state machine allows moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Failed, Self::Starting | Self::Stopped)
                | (Self::Starting, Self::Running | Self::Stopped | Self::Failed)
                | (Self::Running, Self::Stopping | Self::Stopped | Self::Failed)
                | (Self::Stopping, Self::Stopped | Self::Failed)
        )
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ItemState {
    type Error = ParseItemStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "stopped" => Ok(Self::Stopped),
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopping" => Ok(Self::Stopping),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseItemStateError(value.to_owned())),
        }
    }
}

/// Lifecycle operation requested on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOperation {
    /// Start the item's process.
    Start,
    /// Stop the item's process.
    Stop,
    /// Observe the item's process status.
    Refresh,
    /// Clear a failed state.
    Reset,
}

impl LifecycleOperation {
    /// Returns the operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Refresh => "refresh",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Unvalidated request to create an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Requested identifier.
    pub id: ItemId,
    /// Requested display name, validated on create.
    pub name: String,
    /// Requested version, validated on create.
    pub version: String,
    /// Optional URL, validated on create.
    pub url: Option<String>,
    /// Optional launch command.
    pub command: Option<LaunchCommand>,
}

impl NewItem {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            url: None,
            command: None,
        }
    }

    /// Sets the item URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the launch command.
    #[must_use]
    pub fn with_command(mut self, command: LaunchCommand) -> Self {
        self.command = Some(command);
        self
    }
}

/// Item aggregate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    name: ItemName,
    version: ItemVersion,
    url: Option<ItemUrl>,
    command: Option<LaunchCommand>,
    pid: Option<ProcessId>,
    state: ItemState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedItemData {
    /// Persisted identifier.
    pub id: ItemId,
    /// Persisted display name.
    pub name: ItemName,
    /// Persisted version.
    pub version: ItemVersion,
    /// Persisted URL, if any.
    pub url: Option<ItemUrl>,
    /// Persisted launch command, if any.
    pub command: Option<LaunchCommand>,
    /// Persisted process id, if any.
    pub pid: Option<ProcessId>,
    /// Persisted lifecycle state.
    pub state: ItemState,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Validates a creation request and builds a stopped item.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDomainError`] when the name, version, or URL is invalid.
    pub fn create(new_item: NewItem, created_at: DateTime<Utc>) -> Result<Self, ItemDomainError> {
        let name = ItemName::new(new_item.name)?;
        let version = ItemVersion::new(new_item.version)?;
        let url = new_item.url.map(ItemUrl::new).transpose()?;

        Ok(Self {
            id: new_item.id,
            name,
            version,
            url,
            command: new_item.command,
            pid: None,
            state: ItemState::Stopped,
            created_at,
            updated_at: created_at,
        })
    }

    /// Reconstructs an item from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvariantViolation`] when the persisted pid
    /// does not agree with the persisted state.
    pub fn from_persisted(data: PersistedItemData) -> Result<Self, LifecycleFault> {
        let item = Self {
            id: data.id,
            name: data.name,
            version: data.version,
            url: data.url,
            command: data.command,
            pid: data.pid,
            state: data.state,
            created_at: data.created_at,
            updated_at: data.updated_at,
        };
        item.check_invariants()?;
        Ok(item)
    }

    /// Returns the item identifier.
    #[must_use]
    pub const fn id(&self) -> &ItemId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &ItemName {
        &self.name
    }

    /// Returns the version.
    #[must_use]
    pub const fn version(&self) -> &ItemVersion {
        &self.version
    }

    /// Returns the URL, if any.
    #[must_use]
    pub const fn url(&self) -> Option<&ItemUrl> {
        self.url.as_ref()
    }

    /// Returns the launch command, if any.
    #[must_use]
    pub const fn command(&self) -> Option<&LaunchCommand> {
        self.command.as_ref()
    }

    /// Returns the process id while the item holds one.
    #[must_use]
    pub const fn pid(&self) -> Option<ProcessId> {
        self.pid
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ItemState {
        self.state
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Checks that the pid is present exactly when the state holds one.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvariantViolation`] on mismatch.
    pub fn check_invariants(&self) -> Result<(), LifecycleFault> {
        match (self.state.holds_pid(), self.pid) {
            (true, None) => Err(self.violation(format!("state {} requires a pid", self.state))),
            (false, Some(pid)) => Err(self.violation(format!(
                "state {} must not carry pid {pid}",
                self.state
            ))),
            _ => Ok(()),
        }
    }

    /// Moves a stopped or failed item to `starting`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvalidTransition`] from any other state.
    pub fn begin_start(&mut self, clock: &impl Clock) -> Result<(), LifecycleFault> {
        self.require(
            LifecycleOperation::Start,
            matches!(self.state, ItemState::Stopped | ItemState::Failed),
        )?;
        self.transition(ItemState::Starting, None, clock)
    }

    /// Records the spawned process and moves the item to `running`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvariantViolation`] unless the item is
    /// `starting`.
    pub fn mark_running(&mut self, pid: ProcessId, clock: &impl Clock) -> Result<(), LifecycleFault> {
        self.transition(ItemState::Running, Some(pid), clock)
    }

    /// Moves a running item to `stopping`, keeping its pid.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvalidTransition`] unless the item is
    /// `running`.
    pub fn begin_stop(&mut self, clock: &impl Clock) -> Result<(), LifecycleFault> {
        self.require(
            LifecycleOperation::Stop,
            matches!(self.state, ItemState::Running),
        )?;
        self.transition(ItemState::Stopping, self.pid, clock)
    }

    /// Moves the item to `stopped` and clears its pid.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvariantViolation`] when the state machine
    /// forbids the move.
    pub fn mark_stopped(&mut self, clock: &impl Clock) -> Result<(), LifecycleFault> {
        self.transition(ItemState::Stopped, None, clock)
    }

    /// Moves the item to `failed` and clears its pid.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvariantViolation`] when the state machine
    /// forbids the move.
    pub fn mark_failed(&mut self, clock: &impl Clock) -> Result<(), LifecycleFault> {
        self.transition(ItemState::Failed, None, clock)
    }

    /// Clears a failed state back to `stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvalidTransition`] unless the item is
    /// `failed`.
    pub fn reset(&mut self, clock: &impl Clock) -> Result<(), LifecycleFault> {
        self.require(
            LifecycleOperation::Reset,
            matches!(self.state, ItemState::Failed),
        )?;
        self.transition(ItemState::Stopped, None, clock)
    }

    /// Checks that a refresh is valid from the current state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvalidTransition`] unless the item is
    /// `starting`, `running`, or `stopping`.
    pub fn ensure_refreshable(&self) -> Result<(), LifecycleFault> {
        self.require(LifecycleOperation::Refresh, self.state.is_active())
    }

    /// Applies an observed process status.
    ///
    /// A live process leaves the item untouched. A clean exit moves it to
    /// `stopped`. Any other exit moves it to `failed`, except while
    /// `stopping`, where every exit completes the requested stop.
    ///
    /// Returns whether the item changed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleFault::InvalidTransition`] unless the item is
    /// active.
    pub fn observe(
        &mut self,
        status: ProcessStatus,
        clock: &impl Clock,
    ) -> Result<bool, LifecycleFault> {
        self.ensure_refreshable()?;

        let next = match (self.state, status) {
            (_, ProcessStatus::Running) => return Ok(false),
            (ItemState::Stopping, _) | (_, ProcessStatus::Exited(0)) => ItemState::Stopped,
            _ => ItemState::Failed,
        };
        self.transition(next, None, clock)?;
        Ok(true)
    }

    fn require(&self, operation: LifecycleOperation, allowed: bool) -> Result<(), LifecycleFault> {
        if allowed {
            return Ok(());
        }

        Err(LifecycleFault::InvalidTransition {
            id: self.id.clone(),
            operation,
            state: self.state,
        })
    }

    fn transition(
        &mut self,
        next: ItemState,
        pid: Option<ProcessId>,
        clock: &impl Clock,
    ) -> Result<(), LifecycleFault> {
        if !self.state.can_transition_to(next) {
            return Err(self.violation(format!("illegal transition {} -> {next}", self.state)));
        }

        let previous = (self.state, self.pid);
        self.state = next;
        self.pid = pid;
        if let Err(fault) = self.check_invariants() {
            (self.state, self.pid) = previous;
            return Err(fault);
        }

        self.touch(clock);
        Ok(())
    }

    fn violation(&self, detail: String) -> LifecycleFault {
        LifecycleFault::InvariantViolation {
            id: self.id.clone(),
            detail,
        }
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
