use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use batchflow::dag::RunnableTask;
use batchflow::engine::TaskOutcome;
use batchflow::exec::CommandRunner;
use tokio::sync::oneshot;

/// A `CommandRunner` that pretends to run commands.
///
/// Each task "runs" for `delay`, then returns its scripted outcome (keyed by
/// url, `Success` by default). A cancel signal cuts the wait short and
/// yields `Cancelled`.
pub struct ScriptedRunner {
    delay: Duration,
    outcomes: HashMap<String, TaskOutcome>,
    started: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            outcomes: HashMap::new(),
            started: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_outcome(mut self, url: &str, outcome: TaskOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    /// Urls in the order they started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Highest number of tasks that ran at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        task: &'a RunnableTask,
        cancel: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.started.lock().unwrap().push(task.url.clone());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let outcome = tokio::select! {
                _ = tokio::time::sleep(self.delay) => {
                    self.outcomes.get(&task.url).copied().unwrap_or(TaskOutcome::Success)
                }
                Ok(()) = cancel => TaskOutcome::Cancelled,
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }
}
