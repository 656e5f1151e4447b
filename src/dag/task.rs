// src/dag/task.rs

//! Task entities stored in a workflow's arena.

use std::fmt;

use crate::dag::workflow::InstanceId;
use crate::types::{TaskKind, TaskState};

/// Stable index of a task inside its workflow's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey(pub(crate) usize);

impl TaskKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of the task tree.
///
/// Relations to other tasks are held as [`TaskKey`]s into the owning
/// workflow; nothing here owns another task.
#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) key: TaskKey,
    pub(crate) id: String,
    pub(crate) url: String,
    pub(crate) kind: TaskKind,
    pub(crate) state: TaskState,
    pub(crate) command: Option<String>,
    pub(crate) desc: Option<String>,
    pub(crate) parent: Option<TaskKey>,
    pub(crate) children: Vec<TaskKey>,
    pub(crate) predecessors: Vec<TaskKey>,
    pub(crate) successors: Vec<TaskKey>,
    pub(crate) unfinished_children: usize,
}

impl Task {
    pub(crate) fn new(key: TaskKey, id: &str, command: Option<String>, desc: Option<String>) -> Self {
        Self {
            key,
            id: id.to_string(),
            url: String::new(),
            kind: TaskKind::Unit,
            state: TaskState::Inactive,
            command,
            desc,
            parent: None,
            children: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            unfinished_children: 0,
        }
    }

    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind == TaskKind::Group
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Command line for units. Always `None` for groups.
    pub fn command(&self) -> Option<&str> {
        match self.kind {
            TaskKind::Unit => self.command.as_deref(),
            TaskKind::Group => None,
        }
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn parent(&self) -> Option<TaskKey> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn children(&self) -> &[TaskKey] {
        &self.children
    }

    /// Sibling tasks this one depends on.
    pub fn predecessors(&self) -> &[TaskKey] {
        &self.predecessors
    }

    /// Sibling tasks that depend on this one.
    pub fn successors(&self) -> &[TaskKey] {
        &self.successors
    }

    pub fn unfinished_children(&self) -> usize {
        self.unfinished_children
    }
}

/// A unit task handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableTask {
    pub instance_id: InstanceId,
    pub flow_id: String,
    pub id: String,
    pub url: String,
    pub command: String,
}
