// src/dag/mod.rs

//! Task tree, per-group dependency graphs and scheduling.
//!
//! - [`builder`] compiles a flow definition into a [`Workflow`].
//! - [`graph`] holds the dependency DAG between the children of one group.
//! - [`task`] defines the arena entities and the tasks handed to executors.
//! - [`workflow`] owns one instance's tasks and applies state transitions.
//! - [`scheduler`] decides which tasks become runnable after each change.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod builder;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod task;
pub mod workflow;

pub use builder::{CompileOptions, GraphBuilder, compile};
pub use graph::{EdgeRejected, GroupGraph};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task::{RunnableTask, Task, TaskKey};
pub use workflow::{InstanceId, StateChange, Workflow};
