// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dag::CompileOptions;
use crate::exec::PoolOptions;

/// A flow definition as read from a definition file.
///
/// The file is a mapping from task id to task attributes:
///
/// ```toml
/// [nightly]
/// desc = "nightly batch"
///
/// [extract]
/// group = "nightly"
/// command = "./extract.sh"
///
/// [load]
/// group = "nightly"
/// command = "./load.sh"
/// depends = ["extract"]
/// ```
///
/// The task whose `group` is missing (or equal to its own id) is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowDefinition {
    tasks: BTreeMap<String, TaskDefinition>,
}

impl FlowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, task: TaskDefinition) -> Option<TaskDefinition> {
        self.tasks.insert(id.into(), task)
    }

    pub fn get(&self, id: &str) -> Option<&TaskDefinition> {
        self.tasks.get(id)
    }

    /// Tasks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskDefinition)> {
        self.tasks.iter().map(|(id, task)| (id.as_str(), task))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<(String, TaskDefinition)> for FlowDefinition {
    fn from_iter<I: IntoIterator<Item = (String, TaskDefinition)>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// Attributes of one task in a [`FlowDefinition`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Id of the owning group. `None` (or the task's own id) marks the root.
    #[serde(default)]
    pub group: Option<String>,

    /// Free-form description, shown by `--dry-run`.
    #[serde(default)]
    pub desc: Option<String>,

    /// Command line run through the platform shell. Required for leaves.
    #[serde(default, alias = "script", alias = "cmd")]
    pub command: Option<String>,

    /// Sibling task ids that must complete before this task may run.
    #[serde(default)]
    pub depends: Vec<String>,
}

/// Runner settings as read from `Batchflow.toml`, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub flow: FlowSection,
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Workers kept alive for the whole run.
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,

    /// Upper bound on concurrently running commands.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Wall-clock limit per command, e.g. `"90s"` or `"2h"`.
    #[serde(default)]
    pub command_timeout: Option<String>,
}

fn default_min_workers() -> usize {
    1
}

fn default_max_workers() -> usize {
    4
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            command_timeout: None,
        }
    }
}

/// `[flow]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowSection {
    /// Maximum group nesting depth; the root is depth 0.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Validated runner settings.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// `Default`, so the worker bounds and timeout are always consistent.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub flow: FlowSection,
    command_timeout: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        flow: FlowSection,
        command_timeout: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            flow,
            command_timeout,
        }
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// Override the worker ceiling (from `--max-workers`), keeping
    /// `min_workers <= max_workers`.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        self.executor.max_workers = max_workers;
        self.executor.min_workers = self.executor.min_workers.min(max_workers);
        self
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_depth: self.flow.max_depth,
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            min_workers: self.executor.min_workers,
            max_workers: self.executor.max_workers,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ExecutorSection::default(), FlowSection::default(), None)
    }
}
