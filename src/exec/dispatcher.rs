// src/exec/dispatcher.rs

//! Bounded worker pool draining a FIFO queue of runnable tasks.
//!
//! - `min_workers` resident workers live as long as the dispatcher.
//! - When the queue holds more tasks than there are idle workers, elastic
//!   workers are added up to `max_workers`; they retire once the queue is
//!   empty.
//! - The queue itself is unbounded. Bursts simply wait.
//!
//! Workers never touch a workflow. Each outcome is posted to the runtime as
//! a `RuntimeEvent::TaskCompleted`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::{InstanceId, RunnableTask};
use crate::engine::RuntimeEvent;
use crate::exec::command::CommandRunner;

/// Worker bounds for the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub min_workers: usize,
    pub max_workers: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 4,
        }
    }
}

/// Handle to the worker pool. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<PoolState>,
    notify: Notify,
    runner: Arc<dyn CommandRunner>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    options: PoolOptions,
    workers: AtomicUsize,
    busy: AtomicUsize,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<RunnableTask>,
    /// Cancel handles of running tasks, by instance then url.
    running: HashMap<InstanceId, HashMap<String, oneshot::Sender<()>>>,
    closed: bool,
}

enum Next {
    Task(RunnableTask, oneshot::Receiver<()>),
    Empty,
    Closed,
}

impl Dispatcher {
    /// Start the pool with its resident workers. Must be called from within
    /// a Tokio runtime.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        options: PoolOptions,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let options = PoolOptions {
            min_workers: options.min_workers.max(1),
            max_workers: options.max_workers.max(options.min_workers.max(1)),
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::default()),
            notify: Notify::new(),
            runner,
            runtime_tx,
            options,
            workers: AtomicUsize::new(0),
            busy: AtomicUsize::new(0),
        });

        for _ in 0..options.min_workers {
            spawn_worker(&shared, true);
        }
        info!(
            min_workers = options.min_workers,
            max_workers = options.max_workers,
            "dispatcher started"
        );

        Self { shared }
    }

    pub fn options(&self) -> PoolOptions {
        self.shared.options
    }

    /// Queue tasks for execution.
    pub fn submit(&self, tasks: Vec<RunnableTask>) {
        if tasks.is_empty() {
            return;
        }
        let count = tasks.len();
        {
            let mut state = self.shared.lock();
            if state.closed {
                warn!(dropped = count, "dispatcher closed; dropping submitted tasks");
                return;
            }
            state.queue.extend(tasks);
        }
        for _ in 0..count {
            self.shared.notify.notify_one();
        }
        self.grow();
    }

    /// Drop queued tasks of `instance` and signal its running processes to
    /// stop. Returns how many queued tasks were dropped.
    pub fn cancel_instance(&self, instance: InstanceId) -> usize {
        let (dropped, running) = {
            let mut state = self.shared.lock();
            let before = state.queue.len();
            state.queue.retain(|t| t.instance_id != instance);
            let dropped = before - state.queue.len();
            let running = state.running.remove(&instance).unwrap_or_default();
            (dropped, running)
        };

        let killed = running.len();
        for (url, cancel) in running {
            if cancel.send(()).is_err() {
                debug!(url = %url, "task finished before it could be cancelled");
            }
        }
        info!(
            instance = %instance,
            dropped,
            killed,
            "cancelled instance in dispatcher"
        );
        dropped
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Tasks currently executing.
    pub fn running(&self) -> usize {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        self.shared.workers.load(Ordering::SeqCst)
    }

    /// Stop accepting work and let every worker exit once its current task
    /// is done. Queued tasks are dropped.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            state.closed = true;
            state.queue.clear();
        }
        self.shared.notify.notify_waiters();
        // A resident worker between its empty check and `notified()` picks
        // this permit up instead.
        self.shared.notify.notify_one();
        debug!("dispatcher shut down");
    }

    /// Add elastic workers while the backlog exceeds idle capacity.
    fn grow(&self) {
        let queued = self.queued();
        loop {
            let workers = self.shared.workers.load(Ordering::SeqCst);
            let idle = workers.saturating_sub(self.shared.busy.load(Ordering::SeqCst));
            if queued <= idle || workers >= self.shared.options.max_workers {
                return;
            }
            if self
                .shared
                .workers
                .compare_exchange(workers, workers + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                spawn_elastic_worker(&self.shared);
            }
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the next task and register its cancel handle under one lock, so
    /// a concurrent `cancel_instance` either drops it from the queue or
    /// finds its handle.
    fn next(&self) -> Next {
        let mut state = self.lock();
        if state.closed {
            return Next::Closed;
        }
        let Some(task) = state.queue.pop_front() else {
            return Next::Empty;
        };
        let (cancel_tx, cancel_rx) = oneshot::channel();
        state
            .running
            .entry(task.instance_id)
            .or_default()
            .insert(task.url.clone(), cancel_tx);
        Next::Task(task, cancel_rx)
    }

    fn finish(&self, task: &RunnableTask) {
        let mut state = self.lock();
        if let Some(urls) = state.running.get_mut(&task.instance_id) {
            urls.remove(&task.url);
            if urls.is_empty() {
                state.running.remove(&task.instance_id);
            }
        }
    }
}

fn spawn_worker(shared: &Arc<Shared>, resident: bool) {
    shared.workers.fetch_add(1, Ordering::SeqCst);
    tokio::spawn(worker_loop(Arc::clone(shared), resident));
}

/// Like [`spawn_worker`] for a slot already reserved by the caller.
fn spawn_elastic_worker(shared: &Arc<Shared>) {
    debug!("adding elastic worker");
    tokio::spawn(worker_loop(Arc::clone(shared), false));
}

async fn worker_loop(shared: Arc<Shared>, resident: bool) {
    loop {
        match shared.next() {
            Next::Task(task, cancel_rx) => {
                shared.busy.fetch_add(1, Ordering::SeqCst);
                let outcome = shared.runner.run(&task, cancel_rx).await;
                shared.finish(&task);
                shared.busy.fetch_sub(1, Ordering::SeqCst);

                debug!(url = %task.url, ?outcome, "task finished in worker");
                let event = RuntimeEvent::TaskCompleted {
                    instance: task.instance_id,
                    url: task.url,
                    outcome,
                };
                if shared.runtime_tx.send(event).await.is_err() {
                    debug!("runtime channel closed; worker exiting");
                    break;
                }
            }
            Next::Empty if resident => shared.notify.notified().await,
            Next::Empty | Next::Closed => break,
        }
    }
    shared.workers.fetch_sub(1, Ordering::SeqCst);
}
