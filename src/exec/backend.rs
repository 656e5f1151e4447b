// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of the worker pool
//! directly. This makes it easy to swap in a fake executor in tests while
//! keeping the production executor implementation in [`dispatcher`].
//!
//! - `RealExecutorBackend` is the default implementation used by
//!   `batchflow`. It wraps a [`Dispatcher`] running shell commands.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were dispatched and directly emits `TaskCompleted` events.
//!
//! [`dispatcher`]: crate::exec::dispatcher

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::dag::{InstanceId, RunnableTask};
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::command::{CommandRunner, ShellCommandRunner};
use crate::exec::dispatcher::{Dispatcher, PoolOptions};

/// Trait abstracting how runnable tasks are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// The implementation is free to:
    /// - spawn OS processes (production)
    /// - simulate completion and emit `RuntimeEvent`s (tests)
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<RunnableTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop everything still outstanding for `instance`.
    fn cancel_instance(
        &mut self,
        _instance: InstanceId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    dispatcher: Dispatcher,
}

impl RealExecutorBackend {
    /// Create a backend running shell commands, wiring it to the given
    /// runtime event sender.
    ///
    /// This spawns the resident workers immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        options: PoolOptions,
        command_timeout: Option<Duration>,
    ) -> Self {
        Self::with_runner(
            runtime_tx,
            options,
            Arc::new(ShellCommandRunner::new(command_timeout)),
        )
    }

    pub fn with_runner(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        options: PoolOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(runner, options, runtime_tx),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Drop for RealExecutorBackend {
    fn drop(&mut self) {
        self.dispatcher.shutdown();
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<RunnableTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.dispatcher.submit(tasks);
        Box::pin(async { Ok(()) })
    }

    fn cancel_instance(
        &mut self,
        instance: InstanceId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.dispatcher.cancel_instance(instance);
        Box::pin(async { Ok(()) })
    }
}
