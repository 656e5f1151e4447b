// src/dag/workflow.rs

//! One compiled flow instance and its state machine.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::dag::graph::GroupGraph;
use crate::dag::task::{Task, TaskKey};
use crate::errors::{BatchflowError, Result};
use crate::types::TaskState;

/// Identity of one launched instance of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub instance_id: InstanceId,
    pub url: String,
    pub old: TaskState,
    pub new: TaskState,
    pub(crate) key: TaskKey,
}

/// All tasks of one flow instance, indexed by id and url, plus the
/// dependency graph of every group.
///
/// Group graphs never change after compilation and are shared between
/// instances launched from the same template. Task state is per instance.
#[derive(Debug, Clone)]
pub struct Workflow {
    instance_id: InstanceId,
    flow_id: String,
    root: TaskKey,
    pub(crate) tasks: Vec<Task>,
    id_index: HashMap<String, TaskKey>,
    url_index: HashMap<String, TaskKey>,
    graphs: Arc<HashMap<TaskKey, GroupGraph>>,
}

impl Workflow {
    pub(crate) fn from_parts(
        flow_id: String,
        root: TaskKey,
        tasks: Vec<Task>,
        id_index: HashMap<String, TaskKey>,
        graphs: Arc<HashMap<TaskKey, GroupGraph>>,
    ) -> Self {
        let url_index = tasks.iter().map(|t| (t.url.clone(), t.key)).collect();
        let mut workflow = Self {
            instance_id: InstanceId::new(),
            flow_id,
            root,
            tasks,
            id_index,
            url_index,
            graphs,
        };
        workflow.standby();
        workflow
    }

    /// A copy of this workflow with a fresh instance id, reset to standby.
    pub fn new_instance(&self) -> Workflow {
        let mut instance = self.clone();
        instance.instance_id = InstanceId::new();
        instance.standby();
        instance
    }

    /// Register the flow under a name other than its root id.
    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = flow_id.into();
        self
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn root(&self) -> &Task {
        &self.tasks[self.root.0]
    }

    pub(crate) fn root_key(&self) -> TaskKey {
        self.root
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in arena order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn get(&self, key: TaskKey) -> Option<&Task> {
        self.tasks.get(key.0)
    }

    pub fn task(&self, url: &str) -> Option<&Task> {
        self.url_index.get(url).map(|k| &self.tasks[k.0])
    }

    pub fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.id_index.get(id).map(|k| &self.tasks[k.0])
    }

    pub fn state_of(&self, url: &str) -> Option<TaskState> {
        self.task(url).map(Task::state)
    }

    /// The flow's state is its root's state.
    pub fn flow_state(&self) -> TaskState {
        self.root().state
    }

    pub fn is_terminal(&self) -> bool {
        self.flow_state().is_terminal()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.url.as_str()).collect()
    }

    pub fn children_of(&self, url: &str) -> Option<Vec<&Task>> {
        let task = self.task(url)?;
        Some(task.children.iter().map(|k| &self.tasks[k.0]).collect())
    }

    pub fn graph_of(&self, url: &str) -> Option<&GroupGraph> {
        let key = self.url_index.get(url)?;
        self.graphs.get(key)
    }

    pub(crate) fn graph_by_key(&self, key: TaskKey) -> Option<&GroupGraph> {
        self.graphs.get(&key)
    }

    pub fn unfinished_children_of(&self, url: &str) -> Option<usize> {
        let task = self.task(url)?;
        task.is_group().then_some(task.unfinished_children)
    }

    pub(crate) fn key_of(&self, url: &str) -> Result<TaskKey> {
        self.url_index
            .get(url)
            .copied()
            .ok_or_else(|| BatchflowError::TaskNotFound(url.to_string()))
    }

    /// Reset every task to `Inactive` and every group's unfinished count to
    /// its number of children. Calling it twice changes nothing.
    pub fn standby(&mut self) {
        for task in &mut self.tasks {
            task.state = TaskState::Inactive;
            task.unfinished_children = task.children.len();
        }
        trace!(instance = %self.instance_id, "workflow reset to standby");
    }

    /// Apply one transition by url and return every change it caused,
    /// including propagation to ancestors.
    ///
    /// `Inactive -> Failed` is only reachable through `abort`.
    pub fn report_state(&mut self, url: &str, new: TaskState) -> Result<Vec<StateChange>> {
        let key = self.key_of(url)?;
        let old = self.tasks[key.0].state;
        if old == TaskState::Inactive && new == TaskState::Failed {
            return Err(BatchflowError::InvalidTransition {
                url: url.to_string(),
                from: old,
                to: new,
            });
        }
        let mut changes = Vec::new();
        self.set_state(key, new, &mut changes)?;
        Ok(changes)
    }

    /// Move a dispatched task from `Inactive` to `Active`.
    pub fn mark_running(&mut self, url: &str) -> Result<Vec<StateChange>> {
        self.report_state(url, TaskState::Active)
    }

    /// Validated transition plus upward propagation.
    ///
    /// - `Failed` fails the parent unless the parent already finished.
    /// - `Complete` decrements the parent's unfinished count and completes an
    ///   `Active` parent once the count reaches zero.
    /// - An empty group completes as soon as it becomes `Active`.
    pub(crate) fn set_state(
        &mut self,
        key: TaskKey,
        new: TaskState,
        changes: &mut Vec<StateChange>,
    ) -> Result<()> {
        let task = &mut self.tasks[key.0];
        let old = task.state;
        if !old.can_transition_to(new) {
            return Err(BatchflowError::InvalidTransition {
                url: task.url.clone(),
                from: old,
                to: new,
            });
        }

        task.state = new;
        debug!(
            instance = %self.instance_id,
            url = %task.url,
            from = %old,
            to = %new,
            "task state changed"
        );
        changes.push(StateChange {
            instance_id: self.instance_id,
            url: task.url.clone(),
            old,
            new,
            key,
        });

        let parent = task.parent;
        let empty_group = task.is_group() && task.children.is_empty();

        match new {
            TaskState::Failed => {
                if let Some(parent) = parent {
                    if self.tasks[parent.0].state.can_transition_to(TaskState::Failed) {
                        self.set_state(parent, TaskState::Failed, changes)?;
                    }
                }
            }
            TaskState::Complete => {
                if let Some(parent) = parent {
                    let group = &mut self.tasks[parent.0];
                    group.unfinished_children = group.unfinished_children.saturating_sub(1);
                    if group.unfinished_children == 0 && group.state == TaskState::Active {
                        self.set_state(parent, TaskState::Complete, changes)?;
                    }
                }
            }
            TaskState::Active if empty_group => {
                self.set_state(key, TaskState::Complete, changes)?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Indented tree of the flow, children in dependency order.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        self.render_task(self.root, 0, &mut out);
        out
    }

    fn render_task(&self, key: TaskKey, depth: usize, out: &mut String) {
        let task = &self.tasks[key.0];
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}{} [{}] {}", task.url, task.kind, task.state);
        if let Some(command) = task.command() {
            let _ = write!(out, ": {command}");
        }
        if let Some(desc) = task.desc() {
            let _ = write!(out, " ({desc})");
        }
        if !task.predecessors.is_empty() {
            let deps: Vec<&str> = task
                .predecessors
                .iter()
                .map(|k| self.tasks[k.0].id.as_str())
                .collect();
            let _ = write!(out, " after {}", deps.join(", "));
        }
        out.push('\n');

        let order = self
            .graphs
            .get(&key)
            .map(GroupGraph::topological_order)
            .unwrap_or_default();
        for child in order {
            self.render_task(child, depth + 1, out);
        }
    }
}
