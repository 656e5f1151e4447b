// src/dag/graph.rs

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::dag::task::TaskKey;

/// Dependency graph between the direct children of one group.
///
/// Edges point from a dependency to its dependent. The graph only ever holds
/// siblings; edges across groups are rejected before they get here.
#[derive(Debug, Clone)]
pub struct GroupGraph {
    owner: TaskKey,
    graph: DiGraphMap<TaskKey, ()>,
}

/// Why an edge could not be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRejected {
    SelfLoop,
    ClosesCycle,
}

impl GroupGraph {
    pub fn new(owner: TaskKey) -> Self {
        Self {
            owner,
            graph: DiGraphMap::new(),
        }
    }

    /// The group task whose children this graph describes.
    pub fn owner(&self) -> TaskKey {
        self.owner
    }

    pub fn add_vertex(&mut self, task: TaskKey) {
        self.graph.add_node(task);
    }

    /// Insert `dependency -> dependent`, refusing self-loops and edges that
    /// would close a cycle.
    pub fn add_edge(&mut self, dependency: TaskKey, dependent: TaskKey) -> Result<(), EdgeRejected> {
        if dependency == dependent {
            return Err(EdgeRejected::SelfLoop);
        }
        self.add_vertex(dependency);
        self.add_vertex(dependent);
        if has_path_connecting(&self.graph, dependent, dependency, None) {
            return Err(EdgeRejected::ClosesCycle);
        }
        self.graph.add_edge(dependency, dependent, ());
        Ok(())
    }

    pub fn contains(&self, task: TaskKey) -> bool {
        self.graph.contains_node(task)
    }

    /// Tasks that depend directly on `task`.
    pub fn successors(&self, task: TaskKey) -> Vec<TaskKey> {
        let mut out: Vec<TaskKey> = self
            .graph
            .neighbors_directed(task, Direction::Outgoing)
            .collect();
        out.sort();
        out
    }

    /// Tasks `task` depends on directly.
    pub fn predecessors(&self, task: TaskKey) -> Vec<TaskKey> {
        let mut out: Vec<TaskKey> = self
            .graph
            .neighbors_directed(task, Direction::Incoming)
            .collect();
        out.sort();
        out
    }

    /// Children with no dependencies inside the group.
    pub fn entry_points(&self) -> Vec<TaskKey> {
        let mut out: Vec<TaskKey> = self
            .graph
            .nodes()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        out.sort();
        out
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// A dependency-respecting order of the group's children.
    pub fn topological_order(&self) -> Vec<TaskKey> {
        // Cycles are refused on insertion, so this cannot fail.
        toposort(&self.graph, None).unwrap_or_default()
    }
}
