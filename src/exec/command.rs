// src/exec/command.rs

//! The one seam that touches the operating system.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::dag::RunnableTask;
use crate::engine::TaskOutcome;
use crate::exec::task_runner::run_task;

/// Runs a single task's command and reports how it ended.
///
/// The dispatcher only ever talks to this trait, so its queueing and
/// cancellation can be tested with a scripted runner instead of processes.
pub trait CommandRunner: Send + Sync + 'static {
    fn run<'a>(
        &'a self,
        task: &'a RunnableTask,
        cancel: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>>;
}

/// Runs commands through `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone, Default)]
pub struct ShellCommandRunner {
    timeout: Option<Duration>,
}

impl ShellCommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run<'a>(
        &'a self,
        task: &'a RunnableTask,
        cancel: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(run_task(task, cancel, self.timeout))
    }
}
