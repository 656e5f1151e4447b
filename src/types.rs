use std::fmt;
use std::str::FromStr;

/// State of a single task (and, for the root task, of the whole flow).
///
/// - `Inactive`: compiled / reset and waiting to become runnable.
/// - `Active`: the command is running (unit) or the group is open (group).
/// - `Complete` / `Failed`: terminal outcomes of a run.
/// - `Paused` / `Skipped`: manual branches taken from `Inactive`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskState {
    #[default]
    Inactive,
    Active,
    Complete,
    Failed,
    Paused,
    Skipped,
}

impl TaskState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Inactive, Active)
                | (Inactive, Paused)
                | (Inactive, Skipped)
                | (Inactive, Failed)
                | (Active, Complete)
                | (Active, Failed)
                | (Paused, Inactive)
                | (Failed, Inactive)
        )
    }

    /// `Complete`, `Failed` and `Skipped` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Complete | TaskState::Failed | TaskState::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Inactive => "inactive",
            TaskState::Active => "active",
            TaskState::Complete => "complete",
            TaskState::Failed => "failed",
            TaskState::Paused => "paused",
            TaskState::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inactive" => Ok(TaskState::Inactive),
            "active" => Ok(TaskState::Active),
            "complete" => Ok(TaskState::Complete),
            "failed" => Ok(TaskState::Failed),
            "paused" => Ok(TaskState::Paused),
            "skipped" => Ok(TaskState::Skipped),
            other => Err(format!("invalid task state: {other}")),
        }
    }
}

/// Whether a task runs a command or wraps other tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Leaf task that executes an external command.
    Unit,
    /// Task that owns children and their dependency graph.
    Group,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Unit => f.write_str("unit"),
            TaskKind::Group => f.write_str("group"),
        }
    }
}
