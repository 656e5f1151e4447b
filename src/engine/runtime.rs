// src/engine/runtime.rs

use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::dag::{RunnableTask, StateChange};
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, FlowOutcome, RuntimeEvent};

const STATE_CHANNEL_CAPACITY: usize = 256;

/// Drives the flow repository in response to `RuntimeEvent`s,
/// and delegates actual command execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching tasks to the executor and fanning state changes
/// out to subscribers.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    state_tx: broadcast::Sender<StateChange>,
    finished: Vec<FlowOutcome>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            core,
            event_rx,
            executor,
            state_tx,
            finished: Vec::new(),
        }
    }

    /// Receive every applied state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (dispatch, cancel, publish).
    ///
    /// Returns the outcome of every instance that finished while running.
    pub async fn run(mut self) -> Result<Vec<FlowOutcome>> {
        info!("batchflow runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!(finished = self.finished.len(), "runtime exiting");
        Ok(self.finished)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::CancelInstance(instance) => {
                info!(instance = %instance, "cancelling outstanding tasks of instance");
                self.executor.cancel_instance(instance).await?;
            }
            CoreCommand::PublishStateChanges(changes) => {
                for change in changes {
                    info!(
                        instance = %change.instance_id,
                        url = %change.url,
                        from = %change.old,
                        to = %change.new,
                        "state change"
                    );
                    // No subscribers is fine.
                    let _ = self.state_tx.send(change);
                }
            }
            CoreCommand::FlowFinished(outcome) => {
                info!(
                    flow = %outcome.flow_id,
                    instance = %outcome.instance_id,
                    state = %outcome.state,
                    "flow instance finished"
                );
                self.finished.push(outcome);
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<RunnableTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let urls: Vec<_> = tasks.iter().map(|t| t.url.as_str()).collect();
        debug!(?urls, "dispatching runnable tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
