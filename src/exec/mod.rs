// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands of runnable
//! tasks, using `tokio::process::Command`, and reporting back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`command`] defines the `CommandRunner` seam and the shell runner.
//! - [`task_runner`] handles individual task process execution.
//! - [`dispatcher`] owns the bounded worker pool and its FIFO queue.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod command;
pub mod dispatcher;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use command::{CommandRunner, ShellCommandRunner};
pub use dispatcher::{Dispatcher, PoolOptions};
