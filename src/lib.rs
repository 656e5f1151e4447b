// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate, load_definition};
use crate::config::model::ConfigFile;
use crate::dag::compile;
use crate::engine::{CoreRuntime, FlowRepository, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::RealExecutorBackend;
use crate::types::TaskState;

/// What a CLI invocation ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReport {
    /// `--dry-run`: compiled and printed, nothing executed.
    DryRun,
    /// The flow ran until its root reached this terminal state.
    Finished(TaskState),
}

impl RunReport {
    pub fn is_success(self) -> bool {
        matches!(self, RunReport::DryRun | RunReport::Finished(TaskState::Complete))
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config and definition loading
/// - compilation into a workflow
/// - repository / core / runtime
/// - executor
/// - Ctrl-C handling (aborts the flow)
pub async fn run(args: CliArgs) -> Result<RunReport> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(max_workers) = args.max_workers {
        cfg = cfg.with_max_workers(max_workers);
    }

    let definition = load_definition(&args.flow)
        .with_context(|| format!("loading flow definition {}", args.flow.display()))?;
    let workflow = compile(&definition, cfg.compile_options())
        .with_context(|| format!("compiling flow definition {}", args.flow.display()))?;

    if args.dry_run {
        println!("batchflow dry-run: {} tasks", workflow.len());
        print!("{}", workflow.render_tree());
        debug!("dry-run complete (no execution)");
        return Ok(RunReport::DryRun);
    }

    let flow_id = workflow.flow_id().to_string();
    let mut repo = FlowRepository::new(cfg.compile_options());
    repo.register_workflow(workflow);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let executor = RealExecutorBackend::new(rt_tx.clone(), cfg.pool_options(), cfg.command_timeout());

    // Ctrl-C aborts the flow; the runtime exits once it is evicted.
    {
        let tx = rt_tx.clone();
        let flow = flow_id.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::AbortFlow { flow, task: None }).await;
        });
    }

    info!(flow = %flow_id, "starting flow");
    rt_tx
        .send(RuntimeEvent::StartFlow {
            flow: flow_id.clone(),
        })
        .await?;

    let options = RuntimeOptions {
        exit_when_idle: true,
    };
    let core = CoreRuntime::new(repo, options);
    let runtime = Runtime::new(core, rt_rx, executor);
    let finished = runtime.run().await?;

    let state = finished
        .iter()
        .find(|o| o.flow_id == flow_id)
        .map(|o| o.state)
        .ok_or_else(|| anyhow!("flow '{flow_id}' never finished"))?;
    Ok(RunReport::Finished(state))
}

/// Explicit `--config` must exist; the default path is optional.
fn load_config(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return load_and_validate(path)
            .with_context(|| format!("loading config {}", path.display()));
    }

    let default_path = default_config_path();
    if default_path.is_file() {
        return load_and_validate(&default_path)
            .with_context(|| format!("loading config {}", default_path.display()));
    }

    debug!("no config file found; using defaults");
    Ok(ConfigFile::default())
}
