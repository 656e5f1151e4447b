// src/engine/mod.rs

//! Orchestration engine for batchflow.
//!
//! This module ties together:
//! - the flow repository (registered definitions and live instances)
//! - the main runtime event loop that reacts to:
//!   - start and abort requests
//!   - task completion events from the executor
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::dag::InstanceId;
use crate::types::TaskState;

/// Outcome of a task process, as reported by an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Process exited with a nonzero code (or was killed by a signal, -1).
    Failed(i32),
    /// The command could not be started at all.
    SpawnFailed,
    /// The process was killed because its instance was aborted.
    Cancelled,
    /// The process exceeded `command_timeout` and was killed.
    TimedOut,
}

impl TaskOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    /// Everything except `Success` fails the task.
    pub fn to_state(self) -> TaskState {
        if self.is_success() {
            TaskState::Complete
        } else {
            TaskState::Failed
        }
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once no flow instance is live (used by the
    /// CLI, which runs one flow and quits).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the CLI, executors, signal
/// handlers, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Launch a new instance of a registered flow.
    StartFlow { flow: String },
    /// Abort the live instance of `flow`, or only `task` inside it.
    AbortFlow { flow: String, task: Option<String> },
    /// A task process exited with a concrete outcome.
    TaskCompleted {
        instance: InstanceId,
        url: String,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod repository;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep, FlowOutcome};
pub use repository::FlowRepository;
pub use runtime::Runtime;
