// src/engine/repository.rs

//! Registered flow definitions and their live instances.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::config::model::FlowDefinition;
use crate::dag::{CompileOptions, InstanceId, SchedulerStep, Workflow, compile};
use crate::engine::TaskOutcome;
use crate::errors::{BatchflowError, Result};
use crate::types::TaskState;

/// Compiled templates keyed by flow id, plus every running instance.
///
/// Instances are evicted as soon as their root reaches a terminal state;
/// the final state stays queryable through [`FlowRepository::flow_state`].
#[derive(Debug, Default)]
pub struct FlowRepository {
    options: CompileOptions,
    templates: HashMap<String, Workflow>,
    instances: HashMap<InstanceId, Workflow>,
    last_state: HashMap<String, TaskState>,
}

impl FlowRepository {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Compile `definition` and store it under `flow_id`, replacing any
    /// earlier template of the same name. A compile error leaves the
    /// repository untouched.
    pub fn register(&mut self, flow_id: impl Into<String>, definition: &FlowDefinition) -> Result<()> {
        let flow_id = flow_id.into();
        let workflow = compile(definition, self.options)?.with_flow_id(flow_id.clone());
        info!(flow = %flow_id, tasks = workflow.len(), "registered flow");
        self.templates.insert(flow_id, workflow);
        Ok(())
    }

    /// Store an already compiled workflow as a template.
    pub fn register_workflow(&mut self, workflow: Workflow) {
        self.templates
            .insert(workflow.flow_id().to_string(), workflow);
    }

    pub fn flows(&self) -> Vec<&str> {
        let mut flows: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        flows.sort_unstable();
        flows
    }

    pub fn template(&self, flow: &str) -> Option<&Workflow> {
        self.templates.get(normalize_flow(flow))
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Workflow> {
        self.instances.get(&id)
    }

    /// Live instances of `flow`.
    pub fn live_instances(&self, flow: &str) -> Vec<InstanceId> {
        let flow = normalize_flow(flow);
        self.instances
            .values()
            .filter(|w| w.flow_id() == flow)
            .map(Workflow::instance_id)
            .collect()
    }

    /// State of the live instance of `flow`, or of the last one to finish.
    pub fn flow_state(&self, flow: &str) -> Option<TaskState> {
        let flow = normalize_flow(flow);
        self.instances
            .values()
            .find(|w| w.flow_id() == flow)
            .map(Workflow::flow_state)
            .or_else(|| self.last_state.get(flow).copied())
    }

    /// No instance is live.
    pub fn is_idle(&self) -> bool {
        self.instances.is_empty()
    }

    /// Launch a new instance of `flow`, refusing while another one is
    /// active.
    pub fn start(&mut self, flow: &str) -> Result<(InstanceId, SchedulerStep)> {
        let flow = normalize_flow(flow);
        if self
            .instances
            .values()
            .any(|w| w.flow_id() == flow && w.flow_state() == TaskState::Active)
        {
            return Err(BatchflowError::FlowAlreadyActive(flow.to_string()));
        }
        self.launch(flow)
    }

    /// Launch a new instance of `flow` alongside any running ones.
    pub fn launch(&mut self, flow: &str) -> Result<(InstanceId, SchedulerStep)> {
        let flow = normalize_flow(flow);
        let template = self
            .templates
            .get(flow)
            .ok_or_else(|| BatchflowError::FlowNotFound(flow.to_string()))?;

        let mut instance = template.new_instance();
        let id = instance.instance_id();
        let step = instance.activate()?;
        self.keep_or_evict(instance);
        Ok((id, step))
    }

    /// Abort the active instance of `flow`, or only `task` (a url or an id)
    /// within it.
    pub fn abort(&mut self, flow: &str, task: Option<&str>) -> Result<(InstanceId, SchedulerStep)> {
        let flow = normalize_flow(flow);
        if !self.templates.contains_key(flow) {
            return Err(BatchflowError::FlowNotFound(flow.to_string()));
        }

        let Some(id) = self
            .instances
            .values()
            .find(|w| w.flow_id() == flow)
            .map(Workflow::instance_id)
        else {
            return Err(match self.last_state.get(flow) {
                Some(state) => BatchflowError::AlreadyTerminal {
                    url: format!("/{flow}"),
                    state: *state,
                },
                None => BatchflowError::FlowNotFound(format!("{flow} (no live instance)")),
            });
        };

        let mut instance = self
            .instances
            .remove(&id)
            .ok_or_else(|| BatchflowError::FlowNotFound(flow.to_string()))?;

        let url = task.map(|t| resolve_task_url(&instance, t));
        let result = instance.abort(url.as_deref());
        match result {
            Ok(step) => {
                self.keep_or_evict(instance);
                Ok((id, step))
            }
            Err(err) => {
                self.instances.insert(id, instance);
                Err(err)
            }
        }
    }

    /// Feed a completion into the matching instance.
    ///
    /// Completions for unknown (already evicted) instances are ignored and
    /// yield `Ok(None)`. On error the instance is left in place; callers
    /// decide whether to [`fail_instance`](Self::fail_instance) it.
    pub fn complete(
        &mut self,
        instance: InstanceId,
        url: &str,
        outcome: TaskOutcome,
    ) -> Result<Option<SchedulerStep>> {
        let Some(mut workflow) = self.instances.remove(&instance) else {
            warn!(
                instance = %instance,
                url = %url,
                ?outcome,
                "completion for unknown instance; ignoring"
            );
            return Ok(None);
        };

        match workflow.report_completion(url, outcome) {
            Ok(step) => {
                self.keep_or_evict(workflow);
                Ok(Some(step))
            }
            Err(err) => {
                self.instances.insert(instance, workflow);
                Err(err)
            }
        }
    }

    /// Force an instance's root to `Failed` and evict it.
    pub fn fail_instance(&mut self, instance: InstanceId) -> Option<SchedulerStep> {
        let mut workflow = self.instances.remove(&instance)?;
        let step = match workflow.abort(None) {
            Ok(step) => step,
            Err(err) => {
                error!(instance = %instance, error = %err, "could not fail instance cleanly");
                SchedulerStep::default()
            }
        };
        self.last_state
            .insert(workflow.flow_id().to_string(), TaskState::Failed);
        Some(step)
    }

    fn keep_or_evict(&mut self, workflow: Workflow) {
        if workflow.is_terminal() {
            let state = workflow.flow_state();
            info!(
                flow = %workflow.flow_id(),
                instance = %workflow.instance_id(),
                state = %state,
                "evicting finished instance"
            );
            self.last_state
                .insert(workflow.flow_id().to_string(), state);
            return;
        }
        self.instances.insert(workflow.instance_id(), workflow);
    }
}

/// Accept `"nightly"` as well as the root url `"/nightly"`.
fn normalize_flow(flow: &str) -> &str {
    flow.strip_prefix('/').unwrap_or(flow)
}

fn resolve_task_url(workflow: &Workflow, task: &str) -> String {
    if task.starts_with('/') {
        return task.to_string();
    }
    workflow
        .task_by_id(task)
        .map(|t| t.url().to_string())
        .unwrap_or_else(|| task.to_string())
}
