// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{error, info, warn};

use crate::dag::{InstanceId, RunnableTask, SchedulerStep, StateChange};
use crate::engine::repository::FlowRepository;
use crate::engine::{RuntimeOptions, TaskOutcome};
use crate::types::TaskState;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<RunnableTask>),
    /// Drop queued tasks and kill running processes of this instance.
    CancelInstance(InstanceId),
    /// Forward applied transitions to subscribers.
    PublishStateChanges(Vec<StateChange>),
    /// An instance reached a terminal state and was evicted.
    FlowFinished(FlowOutcome),
    /// Request that the process exits (no live instance left).
    RequestExit,
}

/// Final state of one flow instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub flow_id: String,
    pub instance_id: InstanceId,
    pub state: TaskState,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    /// All tasks dispatched by this step.
    pub fn dispatched(&self) -> Vec<&RunnableTask> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Handle a request to launch a flow.
pub fn handle_start_flow(
    repo: &mut FlowRepository,
    options: &RuntimeOptions,
    flow: String,
) -> CoreStep {
    let mut commands = Vec::new();

    match repo.start(&flow) {
        Ok((instance, step)) => {
            info!(flow = %flow, instance = %instance, "flow started");
            commands.extend(commands_for_step(&flow, instance, step));
        }
        Err(err) => {
            warn!(flow = %flow, error = %err, "start request rejected");
        }
    }

    finish(repo, options, commands)
}

/// Handle a request to abort a flow (or one task in it).
pub fn handle_abort_flow(
    repo: &mut FlowRepository,
    options: &RuntimeOptions,
    flow: String,
    task: Option<String>,
) -> CoreStep {
    let mut commands = Vec::new();

    match repo.abort(&flow, task.as_deref()) {
        Ok((instance, step)) => {
            commands.extend(commands_for_step(&flow, instance, step));
        }
        Err(err) => {
            warn!(flow = %flow, task = ?task, error = %err, "abort request rejected");
        }
    }

    finish(repo, options, commands)
}

/// Handle a task completion event.
///
/// A completion the instance cannot apply is an integration bug: it is
/// logged, and the instance is failed and evicted.
pub fn handle_task_completion(
    repo: &mut FlowRepository,
    options: &RuntimeOptions,
    instance: InstanceId,
    url: String,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();
    let flow = repo
        .instance(instance)
        .map(|w| w.flow_id().to_string())
        .unwrap_or_default();

    match repo.complete(instance, &url, outcome) {
        Ok(Some(step)) => {
            commands.extend(commands_for_step(&flow, instance, step));
        }
        Ok(None) => {}
        Err(err) => {
            error!(
                instance = %instance,
                url = %url,
                error = %err,
                "completion could not be applied; failing instance"
            );
            if let Some(mut step) = repo.fail_instance(instance) {
                step.flow_finished.get_or_insert(TaskState::Failed);
                commands.extend(commands_for_step(&flow, instance, step));
            }
        }
    }

    finish(repo, options, commands)
}

/// Translate a scheduler step into IO commands.
pub fn commands_for_step(flow: &str, instance: InstanceId, step: SchedulerStep) -> Vec<CoreCommand> {
    let SchedulerStep {
        newly_runnable,
        state_changes,
        flow_finished,
    } = step;

    let mut commands = Vec::new();
    if !state_changes.is_empty() {
        commands.push(CoreCommand::PublishStateChanges(state_changes));
    }
    if !newly_runnable.is_empty() {
        commands.push(CoreCommand::DispatchTasks(newly_runnable));
    }
    if let Some(state) = flow_finished {
        if state != TaskState::Complete {
            commands.push(CoreCommand::CancelInstance(instance));
        }
        commands.push(CoreCommand::FlowFinished(FlowOutcome {
            flow_id: flow.trim_start_matches('/').to_string(),
            instance_id: instance,
            state,
        }));
    }
    commands
}

/// Append `RequestExit` when running in exit-when-idle mode and nothing is
/// live any more.
fn finish(repo: &FlowRepository, options: &RuntimeOptions, mut commands: Vec<CoreCommand>) -> CoreStep {
    let mut keep_running = true;
    if options.exit_when_idle && repo.is_idle() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
