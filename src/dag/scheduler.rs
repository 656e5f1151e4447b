// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task::{RunnableTask, TaskKey};
use crate::dag::workflow::{StateChange, Workflow};
use crate::engine::TaskOutcome;
use crate::errors::{BatchflowError, Result};
use crate::types::TaskState;

/// Runnable-task collector for one workflow.
///
/// It is responsible for:
/// - opening groups (a group that turns `Active` offers every child whose
///   dependencies are already `Complete`)
/// - following completions to the completed task's successors, and one
///   level up whenever a completion closes the enclosing group
/// - marking every task it hands out as `Active`, so nothing is returned
///   twice
///
/// The collector walks the log of applied changes instead of recursing, so
/// a cascade of any depth is a flat loop.
pub struct Scheduler<'a> {
    workflow: &'a mut Workflow,
}

impl<'a> Scheduler<'a> {
    pub fn new(workflow: &'a mut Workflow) -> Self {
        Self { workflow }
    }

    /// Reset the workflow and open the root group.
    pub fn activate(&mut self) -> Result<SchedulerStep> {
        if self.workflow.flow_state() == TaskState::Active {
            return Err(BatchflowError::FlowAlreadyActive(
                self.workflow.flow_id().to_string(),
            ));
        }

        self.workflow.standby();
        info!(
            flow = %self.workflow.flow_id(),
            instance = %self.workflow.instance_id(),
            "activating flow"
        );

        let mut changes = Vec::new();
        let root = self.workflow.root_key();
        self.workflow
            .set_state(root, TaskState::Active, &mut changes)?;
        self.finish_step(changes, false)
    }

    /// Record the outcome of a dispatched unit and collect what it unblocked.
    ///
    /// Reports for a task that is already terminal (typically a process that
    /// exited after its flow was aborted) are ignored and yield an empty step.
    pub fn report_completion(&mut self, url: &str, outcome: TaskOutcome) -> Result<SchedulerStep> {
        let key = self.workflow.key_of(url)?;
        let task = &self.workflow.tasks[key.0];
        let target = outcome.to_state();

        if task.is_group() {
            return Err(BatchflowError::InvalidTransition {
                url: url.to_string(),
                from: task.state,
                to: target,
            });
        }
        if task.state.is_terminal() {
            warn!(
                instance = %self.workflow.instance_id(),
                url = %url,
                state = %task.state,
                ?outcome,
                "ignoring completion for task that already finished"
            );
            return Ok(SchedulerStep::default());
        }
        if task.state != TaskState::Active {
            return Err(BatchflowError::InvalidTransition {
                url: url.to_string(),
                from: task.state,
                to: target,
            });
        }

        let was_terminal = self.workflow.is_terminal();
        let mut changes = Vec::new();
        self.workflow.set_state(key, target, &mut changes)?;
        self.finish_step(changes, was_terminal)
    }

    /// Fail the root (or the given task, which fails its active ancestors).
    pub fn abort(&mut self, url: Option<&str>) -> Result<SchedulerStep> {
        let key = match url {
            Some(url) => self.workflow.key_of(url)?,
            None => self.workflow.root_key(),
        };
        let task = &self.workflow.tasks[key.0];
        if task.state.is_terminal() {
            return Err(BatchflowError::AlreadyTerminal {
                url: task.url.clone(),
                state: task.state,
            });
        }

        info!(
            instance = %self.workflow.instance_id(),
            url = %task.url,
            "aborting"
        );
        let was_terminal = self.workflow.is_terminal();
        let mut changes = Vec::new();
        self.workflow
            .set_state(key, TaskState::Failed, &mut changes)?;
        self.finish_step(changes, was_terminal)
    }

    /// Manual restart of a failed flow: `Failed -> Inactive`, then activate.
    pub fn restart(&mut self) -> Result<SchedulerStep> {
        let root = self.workflow.root_key();
        let mut changes = Vec::new();
        self.workflow
            .set_state(root, TaskState::Inactive, &mut changes)?;

        let mut step = self.activate()?;
        changes.append(&mut step.state_changes);
        step.state_changes = changes;
        Ok(step)
    }

    /// Run the collector over `changes` and package the result.
    fn finish_step(&mut self, mut changes: Vec<StateChange>, was_terminal: bool) -> Result<SchedulerStep> {
        let newly_runnable = self.collect(&mut changes)?;
        let flow_finished = (!was_terminal && self.workflow.is_terminal())
            .then(|| self.workflow.flow_state());

        if let Some(state) = flow_finished {
            info!(
                flow = %self.workflow.flow_id(),
                instance = %self.workflow.instance_id(),
                state = %state,
                "flow finished"
            );
        }

        Ok(SchedulerStep {
            newly_runnable,
            state_changes: changes,
            flow_finished,
        })
    }

    /// Walk the change log, growing it as groups open and close.
    fn collect(&mut self, changes: &mut Vec<StateChange>) -> Result<Vec<RunnableTask>> {
        let mut runnable = Vec::new();
        let mut cursor = 0;

        while cursor < changes.len() {
            let change_key = changes[cursor].key;
            let new_state = changes[cursor].new;
            cursor += 1;

            match new_state {
                TaskState::Active => self.open_group(change_key, changes, &mut runnable)?,
                TaskState::Complete => self.follow_successors(change_key, changes, &mut runnable)?,
                _ => {}
            }
        }

        Ok(runnable)
    }

    /// A group just became active: offer its ready children.
    fn open_group(
        &mut self,
        group: TaskKey,
        changes: &mut Vec<StateChange>,
        runnable: &mut Vec<RunnableTask>,
    ) -> Result<()> {
        let task = &self.workflow.tasks[group.0];
        if !task.is_group() || task.state != TaskState::Active {
            return Ok(());
        }

        let children = task.children.clone();
        for child in children {
            if self.is_ready(child) {
                self.make_runnable(child, changes, runnable)?;
            }
        }
        Ok(())
    }

    /// A task just completed: offer its successors inside the parent group.
    fn follow_successors(
        &mut self,
        completed: TaskKey,
        changes: &mut Vec<StateChange>,
        runnable: &mut Vec<RunnableTask>,
    ) -> Result<()> {
        let Some(parent) = self.workflow.tasks[completed.0].parent else {
            return Ok(());
        };
        if self.workflow.tasks[parent.0].state != TaskState::Active {
            return Ok(());
        }

        let successors = self
            .workflow
            .graph_by_key(parent)
            .map(|graph| graph.successors(completed))
            .ok_or_else(|| {
                BatchflowError::TaskNotFound(self.workflow.tasks[parent.0].url.clone())
            })?;

        for successor in successors {
            if self.is_ready(successor) {
                self.make_runnable(successor, changes, runnable)?;
            }
        }
        Ok(())
    }

    /// `Inactive`, every ancestor `Active`, every predecessor `Complete`.
    ///
    /// Failure only climbs, so a sibling group can still be `Active` under a
    /// failed root.
    fn is_ready(&self, key: TaskKey) -> bool {
        let tasks = &self.workflow.tasks;
        let task = &tasks[key.0];
        if task.state != TaskState::Inactive || task.parent.is_none() {
            return false;
        }
        let mut ancestor = task.parent;
        while let Some(p) = ancestor {
            if tasks[p.0].state != TaskState::Active {
                return false;
            }
            ancestor = tasks[p.0].parent;
        }
        task.predecessors
            .iter()
            .all(|p| tasks[p.0].state == TaskState::Complete)
    }

    /// Mark `key` active. Units are handed out; groups open through the
    /// `Active` entry this appends to the change log.
    fn make_runnable(
        &mut self,
        key: TaskKey,
        changes: &mut Vec<StateChange>,
        runnable: &mut Vec<RunnableTask>,
    ) -> Result<()> {
        self.workflow
            .set_state(key, TaskState::Active, changes)?;

        let task = &self.workflow.tasks[key.0];
        if task.is_group() {
            debug!(url = %task.url, "group opened");
            return Ok(());
        }

        let command = task
            .command()
            .ok_or_else(|| BatchflowError::TaskNotFound(task.url.clone()))?;
        debug!(url = %task.url, "task runnable");
        runnable.push(RunnableTask {
            instance_id: self.workflow.instance_id(),
            flow_id: self.workflow.flow_id().to_string(),
            id: task.id.clone(),
            url: task.url.clone(),
            command: command.to_string(),
        });
        Ok(())
    }
}

impl Workflow {
    /// Reset and start the flow. Returns the entry units.
    pub fn activate(&mut self) -> Result<SchedulerStep> {
        Scheduler::new(self).activate()
    }

    /// Feed back a unit's outcome. Returns what became runnable.
    pub fn report_completion(&mut self, url: &str, outcome: TaskOutcome) -> Result<SchedulerStep> {
        Scheduler::new(self).report_completion(url, outcome)
    }

    pub fn abort(&mut self, url: Option<&str>) -> Result<SchedulerStep> {
        Scheduler::new(self).abort(url)
    }

    pub fn restart(&mut self) -> Result<SchedulerStep> {
        Scheduler::new(self).restart()
    }

    /// Current state of every task, keyed by url.
    pub fn snapshot(&self) -> HashMap<String, TaskState> {
        self.tasks()
            .map(|t| (t.url().to_string(), t.state()))
            .collect()
    }
}
