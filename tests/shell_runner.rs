// tests/shell_runner.rs
#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

use batchflow::dag::{InstanceId, RunnableTask};
use batchflow::engine::{RuntimeEvent, TaskOutcome};
use batchflow::exec::task_runner::run_task;
use batchflow::exec::{CommandRunner, ExecutorBackend, PoolOptions, RealExecutorBackend, ShellCommandRunner};
use batchflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn shell_task(command: &str) -> RunnableTask {
    RunnableTask {
        instance_id: InstanceId::new(),
        flow_id: "flow".to_string(),
        id: "job".to_string(),
        url: "/flow/job".to_string(),
        command: command.to_string(),
    }
}

#[tokio::test]
async fn zero_exit_is_success() {
    init_tracing();
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    let outcome = with_timeout(run_task(&shell_task("echo hello"), cancel_rx, None)).await;
    assert_eq!(outcome, TaskOutcome::Success);
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    let outcome = with_timeout(run_task(&shell_task("exit 3"), cancel_rx, None)).await;
    assert_eq!(outcome, TaskOutcome::Failed(3));
}

#[tokio::test]
async fn unknown_program_fails_through_the_shell() {
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    let outcome = with_timeout(run_task(
        &shell_task("definitely-not-a-real-program-batchflow"),
        cancel_rx,
        None,
    ))
    .await;
    assert_eq!(outcome, TaskOutcome::Failed(127));
}

#[tokio::test]
async fn dropped_cancel_sender_is_not_a_cancellation() {
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    drop(cancel_tx);
    let outcome = with_timeout(run_task(&shell_task("sleep 0.1"), cancel_rx, None)).await;
    assert_eq!(outcome, TaskOutcome::Success);
}

#[tokio::test]
async fn command_timeout_kills_the_process() {
    init_tracing();
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    let started = Instant::now();
    let outcome = with_timeout(run_task(
        &shell_task("sleep 10"),
        cancel_rx,
        Some(Duration::from_millis(100)),
    ))
    .await;

    assert_eq!(outcome, TaskOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancel_signal_kills_the_process() {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = shell_task("sleep 10");

    let run = tokio::spawn(async move { run_task(&task, cancel_rx, None).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel_tx.send(()).expect("runner still waiting");

    let outcome = with_timeout(run).await.expect("runner task panicked");
    assert_eq!(outcome, TaskOutcome::Cancelled);
}

#[tokio::test]
async fn shell_runner_applies_its_timeout() {
    let runner = ShellCommandRunner::new(Some(Duration::from_millis(50)));
    assert_eq!(runner.timeout(), Some(Duration::from_millis(50)));

    let (_cancel_tx, cancel_rx) = oneshot::channel();
    let task = shell_task("sleep 5");
    let outcome = with_timeout(runner.run(&task, cancel_rx)).await;
    assert_eq!(outcome, TaskOutcome::TimedOut);
}

#[tokio::test]
async fn real_backend_runs_shell_commands() -> TestResult {
    init_tracing();
    let (tx, mut rx) = mpsc::channel(8);
    let mut backend = RealExecutorBackend::with_runner(
        tx,
        PoolOptions::default(),
        Arc::new(ShellCommandRunner::default()),
    );

    let ok = shell_task("true");
    let mut bad = shell_task("false");
    bad.url = "/flow/bad".to_string();
    backend.spawn_ready_tasks(vec![ok, bad]).await?;

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        match with_timeout(rx.recv()).await {
            Some(RuntimeEvent::TaskCompleted { url, outcome, .. }) => outcomes.push((url, outcome)),
            other => panic!("Expected TaskCompleted, got {other:?}"),
        }
    }
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        outcomes,
        vec![
            ("/flow/bad".to_string(), TaskOutcome::Failed(1)),
            ("/flow/job".to_string(), TaskOutcome::Success),
        ]
    );
    assert_eq!(backend.dispatcher().queued(), 0);
    Ok(())
}
