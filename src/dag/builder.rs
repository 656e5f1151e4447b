// src/dag/builder.rs

//! Compile a [`FlowDefinition`] into a [`Workflow`].
//!
//! Compilation runs in passes over a task arena:
//!
//! 1. create one task per id and find the unique root
//! 2. link every task to its group, then link sibling dependencies
//! 3. build one [`GroupGraph`] per group, refusing cycles
//! 4. assign urls top-down from the root (tasks never reached are rejected)
//! 5. check commands and nesting depth
//!
//! Any failure aborts the whole compilation; no partial workflow escapes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::config::model::{FlowDefinition, TaskDefinition};
use crate::dag::graph::GroupGraph;
use crate::dag::task::{Task, TaskKey};
use crate::dag::workflow::Workflow;
use crate::errors::CompileError;
use crate::types::TaskKind;

/// Knobs that affect compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Deepest allowed nesting level; the root sits at depth 0.
    pub max_depth: Option<usize>,
}

/// Compile `definition` into a fresh, inactive workflow.
pub fn compile(
    definition: &FlowDefinition,
    options: CompileOptions,
) -> Result<Workflow, CompileError> {
    GraphBuilder::new(definition, options).build()
}

/// Stateful compiler for a single definition. Use [`compile`] unless the
/// builder needs to be held across calls.
pub struct GraphBuilder<'d> {
    definition: &'d FlowDefinition,
    options: CompileOptions,
    tasks: Vec<Task>,
    id_index: HashMap<String, TaskKey>,
}

impl<'d> GraphBuilder<'d> {
    pub fn new(definition: &'d FlowDefinition, options: CompileOptions) -> Self {
        Self {
            definition,
            options,
            tasks: Vec::with_capacity(definition.len()),
            id_index: HashMap::with_capacity(definition.len()),
        }
    }

    pub fn build(mut self) -> Result<Workflow, CompileError> {
        let root = self.create_tasks()?;
        self.link_groups(root)?;
        self.link_dependencies()?;
        let graphs = self.build_group_graphs()?;
        self.assign_urls(root)?;
        self.validate_commands()?;

        let flow_id = self.tasks[root.0].id.clone();
        debug!(
            flow = %flow_id,
            tasks = self.tasks.len(),
            groups = graphs.len(),
            "compiled flow definition"
        );

        Ok(Workflow::from_parts(
            flow_id,
            root,
            self.tasks,
            self.id_index,
            Arc::new(graphs),
        ))
    }

    fn definition_of(&self, key: TaskKey) -> Option<&'d TaskDefinition> {
        self.definition.get(&self.tasks[key.0].id)
    }

    /// Pass 1.
    fn create_tasks(&mut self) -> Result<TaskKey, CompileError> {
        let mut root: Option<TaskKey> = None;

        for (id, def) in self.definition.iter() {
            let key = TaskKey(self.tasks.len());
            self.tasks
                .push(Task::new(key, id, def.command.clone(), def.desc.clone()));
            self.id_index.insert(id.to_string(), key);

            if !is_root_definition(id, def) {
                continue;
            }
            if let Some(existing) = root {
                return Err(CompileError::DuplicateRoot {
                    first: self.tasks[existing.0].id.clone(),
                    second: id.to_string(),
                });
            }
            root = Some(key);
        }

        let root = root.ok_or(CompileError::MissingRoot)?;
        self.tasks[root.0].kind = TaskKind::Group;
        Ok(root)
    }

    /// Pass 2a: parents and children.
    fn link_groups(&mut self, root: TaskKey) -> Result<(), CompileError> {
        for idx in 0..self.tasks.len() {
            let key = TaskKey(idx);
            if key == root {
                continue;
            }
            let Some(def) = self.definition_of(key) else {
                continue;
            };
            let group_id = def.group.as_deref().map(str::trim).unwrap_or_default();
            let parent = *self.id_index.get(group_id).ok_or_else(|| {
                CompileError::UnresolvedGroup {
                    task: self.tasks[idx].id.clone(),
                    group: group_id.to_string(),
                }
            })?;

            self.tasks[idx].parent = Some(parent);
            let group = &mut self.tasks[parent.0];
            group.kind = TaskKind::Group;
            group.children.push(key);
        }
        Ok(())
    }

    /// Pass 2b: sibling dependencies.
    fn link_dependencies(&mut self) -> Result<(), CompileError> {
        for idx in 0..self.tasks.len() {
            let key = TaskKey(idx);
            let Some(def) = self.definition_of(key) else {
                continue;
            };

            let mut seen: HashSet<&str> = HashSet::new();
            for dep_id in def.depends.iter().map(|d| d.trim()) {
                if !seen.insert(dep_id) {
                    continue;
                }
                let task_id = self.tasks[idx].id.clone();
                let dep = *self.id_index.get(dep_id).ok_or_else(|| {
                    CompileError::UnresolvedDependency {
                        task: task_id.clone(),
                        dependency: dep_id.to_string(),
                    }
                })?;

                if dep == key {
                    return Err(CompileError::CyclicDependency {
                        task: task_id,
                        dependency: dep_id.to_string(),
                    });
                }
                if self.tasks[dep.0].parent != self.tasks[idx].parent {
                    return Err(CompileError::CrossGroupDependency {
                        task: task_id,
                        dependency: dep_id.to_string(),
                    });
                }

                self.tasks[idx].predecessors.push(dep);
                self.tasks[dep.0].successors.push(key);
            }
        }
        Ok(())
    }

    /// Pass 3.
    fn build_group_graphs(&self) -> Result<HashMap<TaskKey, GroupGraph>, CompileError> {
        let mut graphs = HashMap::new();

        for group in self.tasks.iter().filter(|t| t.kind == TaskKind::Group) {
            let mut graph = GroupGraph::new(group.key);
            for child in &group.children {
                graph.add_vertex(*child);
            }
            for child in &group.children {
                for pred in &self.tasks[child.0].predecessors {
                    graph.add_edge(*pred, *child).map_err(|rejected| {
                        debug!(group = %group.id, ?rejected, "dependency edge refused");
                        CompileError::CyclicDependency {
                            task: self.tasks[child.0].id.clone(),
                            dependency: self.tasks[pred.0].id.clone(),
                        }
                    })?;
                }
            }
            graphs.insert(group.key, graph);
        }

        Ok(graphs)
    }

    /// Pass 4, plus the depth limit.
    fn assign_urls(&mut self, root: TaskKey) -> Result<(), CompileError> {
        let root_url = format!("/{}", self.tasks[root.0].id);
        self.tasks[root.0].url = root_url;

        let mut visited = vec![false; self.tasks.len()];
        let mut stack: Vec<(TaskKey, usize)> = vec![(root, 0)];

        while let Some((key, depth)) = stack.pop() {
            if visited[key.0] {
                continue;
            }
            visited[key.0] = true;

            if let Some(limit) = self.options.max_depth {
                if depth > limit {
                    return Err(CompileError::MaxDepthExceeded {
                        task: self.tasks[key.0].id.clone(),
                        depth,
                        limit,
                    });
                }
            }

            let parent_url = self.tasks[key.0].url.clone();
            let children = self.tasks[key.0].children.clone();
            for child in children {
                let url = format!("{}/{}", parent_url, self.tasks[child.0].id);
                self.tasks[child.0].url = url;
                stack.push((child, depth + 1));
            }
        }

        if let Some(idx) = visited.iter().position(|v| !v) {
            return Err(CompileError::UnreachableTask(self.tasks[idx].id.clone()));
        }
        Ok(())
    }

    /// Pass 5.
    fn validate_commands(&self) -> Result<(), CompileError> {
        for task in self.tasks.iter().filter(|t| t.kind == TaskKind::Unit) {
            let has_command = task
                .command
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty());
            if !has_command {
                return Err(CompileError::MissingCommand(task.id.clone()));
            }
        }
        Ok(())
    }
}

fn is_root_definition(id: &str, def: &TaskDefinition) -> bool {
    match def.group.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(group) => group == id,
    }
}

