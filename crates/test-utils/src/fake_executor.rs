use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use batchflow::dag::{InstanceId, RunnableTask};
use batchflow::engine::{RuntimeEvent, TaskOutcome};
use batchflow::errors::Result;
use batchflow::exec::ExecutorBackend;
use tokio::sync::mpsc;

/// What the fake executor has seen so far.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    /// Urls in dispatch order.
    pub dispatched: Vec<String>,
    /// Instances the runtime asked to cancel.
    pub cancelled: Vec<InstanceId>,
}

/// A fake executor that:
/// - records which tasks were dispatched
/// - immediately reports `TaskCompleted` for each one, with `Success` unless
///   an outcome was scripted for its url
/// - leaves "held" urls running forever (useful for abort tests)
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    log: Arc<Mutex<ExecutionLog>>,
    outcomes: HashMap<String, TaskOutcome>,
    held: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, log: Arc<Mutex<ExecutionLog>>) -> Self {
        Self {
            runtime_tx,
            log,
            outcomes: HashMap::new(),
            held: HashSet::new(),
        }
    }

    /// Report `outcome` whenever `url` is dispatched.
    pub fn with_outcome(mut self, url: &str, outcome: TaskOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    /// Never report completion for `url`.
    pub fn hold(mut self, url: &str) -> Self {
        self.held.insert(url.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<RunnableTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let log = Arc::clone(&self.log);

        let completions: Vec<RuntimeEvent> = tasks
            .iter()
            .filter(|t| !self.held.contains(&t.url))
            .map(|t| RuntimeEvent::TaskCompleted {
                instance: t.instance_id,
                url: t.url.clone(),
                outcome: self
                    .outcomes
                    .get(&t.url)
                    .copied()
                    .unwrap_or(TaskOutcome::Success),
            })
            .collect();

        Box::pin(async move {
            {
                let mut guard = log.lock().unwrap();
                guard.dispatched.extend(tasks.into_iter().map(|t| t.url));
            }

            for event in completions {
                tx.send(event).await.map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_instance(
        &mut self,
        instance: InstanceId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.log.lock().unwrap().cancelled.push(instance);
        Box::pin(async { Ok(()) })
    }
}
