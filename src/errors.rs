// src/errors.rs

//! Crate-wide error types.
//!
//! - [`CompileError`] covers everything the graph builder can reject. A
//!   definition that fails to compile never produces a `Workflow`.
//! - [`BatchflowError`] is the general error used by the runtime, the
//!   repository and the loaders.

use thiserror::Error;

use crate::types::TaskState;

/// Structural problems found while compiling a flow definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("flow definition has no root task (a task whose group is its own id)")]
    MissingRoot,

    #[error("flow definition has more than one root task: '{first}' and '{second}'")]
    DuplicateRoot { first: String, second: String },

    #[error("task '{task}' refers to unknown group '{group}'")]
    UnresolvedGroup { task: String, group: String },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnresolvedDependency { task: String, dependency: String },

    #[error("task '{task}' depends on '{dependency}', which belongs to a different group")]
    CrossGroupDependency { task: String, dependency: String },

    #[error("dependency '{dependency}' -> '{task}' would create a cycle")]
    CyclicDependency { task: String, dependency: String },

    #[error("task '{0}' cannot be reached from the root task")]
    UnreachableTask(String),

    #[error("task '{0}' has no command")]
    MissingCommand(String),

    #[error("task '{task}' is nested {depth} levels deep (limit {limit})")]
    MaxDepthExceeded {
        task: String,
        depth: usize,
        limit: usize,
    },
}

#[derive(Error, Debug)]
pub enum BatchflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("invalid state transition for '{url}': {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: TaskState,
        to: TaskState,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    #[error("flow '{0}' already has an active instance")]
    FlowAlreadyActive(String),

    #[error("'{url}' is already in terminal state {state}")]
    AlreadyTerminal { url: String, state: TaskState },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BatchflowError>;
