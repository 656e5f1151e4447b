// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `RunnableTask`s to the executor
//! - publishing state changes
//!
//! Every workflow mutation happens inside [`CoreRuntime::step`], which is
//! driven by exactly one loop.

use crate::engine::event_handlers::{
    CoreStep, handle_abort_flow, handle_start_flow, handle_task_completion,
};
use crate::engine::repository::FlowRepository;
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    repo: FlowRepository,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(repo: FlowRepository, options: RuntimeOptions) -> Self {
        Self { repo, options }
    }

    pub fn repository(&self) -> &FlowRepository {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut FlowRepository {
        &mut self.repo
    }

    /// Expose whether any instance is live (for tests).
    pub fn is_idle(&self) -> bool {
        self.repo.is_idle()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::StartFlow { flow } => handle_start_flow(&mut self.repo, &self.options, flow),
            RuntimeEvent::AbortFlow { flow, task } => {
                handle_abort_flow(&mut self.repo, &self.options, flow, task)
            }
            RuntimeEvent::TaskCompleted {
                instance,
                url,
                outcome,
            } => handle_task_completion(&mut self.repo, &self.options, instance, url, outcome),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
