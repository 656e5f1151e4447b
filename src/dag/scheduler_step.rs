// src/dag/scheduler_step.rs

//! Result type for one scheduler step.

use crate::dag::task::RunnableTask;
use crate::dag::workflow::StateChange;
use crate::types::TaskState;

/// Everything a single scheduler call changed.
///
/// Tests step a workflow by hand and assert on these fields; the runtime
/// turns them into dispatch and notification commands.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Units that became runnable and were marked `Active`. No ordering is
    /// implied between them.
    pub newly_runnable: Vec<RunnableTask>,
    /// Every transition applied during the step, in order.
    pub state_changes: Vec<StateChange>,
    /// Set to the root's state when this step moved the root into a
    /// terminal state.
    pub flow_finished: Option<TaskState>,
}

impl SchedulerStep {
    pub fn is_empty(&self) -> bool {
        self.newly_runnable.is_empty() && self.state_changes.is_empty()
    }

    /// Urls of the newly runnable units, sorted.
    pub fn runnable_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.newly_runnable.iter().map(|t| t.url.as_str()).collect();
        urls.sort_unstable();
        urls
    }
}
