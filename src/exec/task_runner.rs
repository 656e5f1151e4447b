// src/exec/task_runner.rs

//! Individual task process runner.

use std::future;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::dag::RunnableTask;
use crate::engine::TaskOutcome;

/// Run one task's command to completion and report how it ended.
///
/// - Output lines are forwarded to `tracing` under the task's url.
/// - If `cancel_rx` fires, the process is killed and `Cancelled` is returned.
///   A dropped sender is not a cancellation.
/// - If `timeout` elapses first, the process is killed and `TimedOut` is
///   returned.
pub async fn run_task(
    task: &RunnableTask,
    cancel_rx: oneshot::Receiver<()>,
    timeout: Option<Duration>,
) -> TaskOutcome {
    match run_task_inner(task, cancel_rx, timeout).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                instance = %task.instance_id,
                url = %task.url,
                error = %err,
                "task execution error"
            );
            TaskOutcome::Failed(-1)
        }
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

async fn run_task_inner(
    task: &RunnableTask,
    cancel_rx: oneshot::Receiver<()>,
    timeout: Option<Duration>,
) -> Result<TaskOutcome> {
    info!(
        instance = %task.instance_id,
        url = %task.url,
        cmd = %task.command,
        "starting task process"
    );

    let mut cmd = shell_command(&task.command);
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(
                url = %task.url,
                cmd = %task.command,
                error = %err,
                "could not spawn task process"
            );
            return Ok(TaskOutcome::SpawnFailed);
        }
    };

    if let Some(stdout) = child.stdout.take() {
        forward_lines(task.url.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(task.url.clone(), "stderr", stderr);
    }

    let cancelled = async {
        if cancel_rx.await.is_err() {
            future::pending::<()>().await;
        }
    };
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => future::pending::<()>().await,
        }
    };

    // Either the process exits on its own, the instance is cancelled, or the
    // wall-clock limit passes.
    let outcome = tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of task '{}'", task.url)
            })?;

            let code = status.code().unwrap_or(-1);
            info!(
                url = %task.url,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            if status.success() {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed(code)
            }
        }

        () = cancelled => {
            info!(url = %task.url, "cancellation requested; killing process");
            kill(&mut child, &task.url).await;
            TaskOutcome::Cancelled
        }

        () = deadline => {
            warn!(url = %task.url, ?timeout, "task exceeded command timeout; killing process");
            kill(&mut child, &task.url).await;
            TaskOutcome::TimedOut
        }
    };

    Ok(outcome)
}

async fn kill(child: &mut Child, url: &str) {
    if let Err(e) = child.kill().await {
        warn!(url = %url, error = %e, "failed to kill child process");
    }
}

/// Drain a pipe line by line so the child never blocks on a full buffer.
fn forward_lines<R>(url: String, stream: &'static str, pipe: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stream == "stderr" {
                debug!(task = %url, "stderr: {}", line);
            } else {
                info!(task = %url, "stdout: {}", line);
            }
        }
    });
}
