#![allow(dead_code)]

use batchflow::config::{FlowDefinition, TaskDefinition};
use batchflow::dag::{CompileOptions, Workflow, compile};

/// Builder for `FlowDefinition` to simplify test setup.
///
/// The root group is created up front; every other task names its group
/// explicitly or lands in the root.
pub struct FlowBuilder {
    root: String,
    definition: FlowDefinition,
}

impl FlowBuilder {
    pub fn new(root: &str) -> Self {
        let mut definition = FlowDefinition::new();
        definition.insert(root, TaskDefinition::default());
        Self {
            root: root.to_string(),
            definition,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Insert an arbitrary task definition.
    pub fn with_task(mut self, id: &str, task: TaskDefinition) -> Self {
        self.definition.insert(id, task);
        self
    }

    /// Unit in the root group.
    pub fn unit(self, id: &str, cmd: &str) -> Self {
        let root = self.root.clone();
        self.unit_in(&root, id, cmd)
    }

    /// Unit in the root group with dependencies.
    pub fn unit_after(self, id: &str, cmd: &str, deps: &[&str]) -> Self {
        let root = self.root.clone();
        let task = TaskBuilder::unit(cmd).group(&root).depends_on(deps).build();
        self.with_task(id, task)
    }

    pub fn unit_in(self, group: &str, id: &str, cmd: &str) -> Self {
        let task = TaskBuilder::unit(cmd).group(group).build();
        self.with_task(id, task)
    }

    pub fn unit_in_after(self, group: &str, id: &str, cmd: &str, deps: &[&str]) -> Self {
        let task = TaskBuilder::unit(cmd).group(group).depends_on(deps).build();
        self.with_task(id, task)
    }

    /// Group whose children are added with `*_in` calls.
    pub fn group_in(self, parent: &str, id: &str, deps: &[&str]) -> Self {
        let task = TaskBuilder::group_task().group(parent).depends_on(deps).build();
        self.with_task(id, task)
    }

    pub fn build(self) -> FlowDefinition {
        self.definition
    }

    /// Compile with default options, panicking on compile errors.
    pub fn compile(self) -> Workflow {
        compile(&self.definition, CompileOptions::default())
            .expect("Failed to compile flow definition from builder")
    }
}

/// Builder for a single `TaskDefinition`.
pub struct TaskBuilder {
    task: TaskDefinition,
}

impl TaskBuilder {
    pub fn unit(cmd: &str) -> Self {
        Self {
            task: TaskDefinition {
                command: Some(cmd.to_string()),
                ..TaskDefinition::default()
            },
        }
    }

    pub fn group_task() -> Self {
        Self {
            task: TaskDefinition::default(),
        }
    }

    pub fn group(mut self, group: &str) -> Self {
        self.task.group = Some(group.to_string());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.task.desc = Some(desc.to_string());
        self
    }

    pub fn depends(mut self, dep: &str) -> Self {
        self.task.depends.push(dep.to_string());
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.task.depends.extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }
}

/// `{A, B: [A], C: [A]}` under root `flow`.
pub fn fan_out_flow() -> FlowBuilder {
    FlowBuilder::new("flow")
        .unit("a", "true")
        .unit_after("b", "true", &["a"])
        .unit_after("c", "true", &["a"])
}

/// Root `flow` holding group `g {x, y: [x]}` and `z: [g]`.
pub fn nested_flow() -> FlowBuilder {
    FlowBuilder::new("flow")
        .group_in("flow", "g", &[])
        .unit_in("g", "x", "true")
        .unit_in_after("g", "y", "true", &["x"])
        .unit_after("z", "true", &["g"])
}
