// tests/scheduler_scenarios.rs

use std::error::Error;

use batchflow::engine::TaskOutcome;
use batchflow::errors::BatchflowError;
use batchflow::types::TaskState;
use batchflow_test_utils::{FlowBuilder, fan_out_flow, init_tracing, nested_flow, urls_in_state};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn fan_out_runs_dependents_after_their_dependency() -> TestResult {
    init_tracing();
    let mut wf = fan_out_flow().compile();

    let step = wf.activate()?;
    assert_eq!(step.runnable_urls(), vec!["/flow/a"]);
    assert_eq!(wf.state_of("/flow"), Some(TaskState::Active));
    assert_eq!(wf.state_of("/flow/a"), Some(TaskState::Active));

    let step = wf.report_completion("/flow/a", TaskOutcome::Success)?;
    assert_eq!(step.runnable_urls(), vec!["/flow/b", "/flow/c"]);
    assert_eq!(step.flow_finished, None);

    let step = wf.report_completion("/flow/b", TaskOutcome::Success)?;
    assert!(step.newly_runnable.is_empty());
    assert_eq!(wf.flow_state(), TaskState::Active);

    let step = wf.report_completion("/flow/c", TaskOutcome::Success)?;
    assert!(step.newly_runnable.is_empty());
    assert_eq!(step.flow_finished, Some(TaskState::Complete));
    assert_eq!(wf.flow_state(), TaskState::Complete);
    Ok(())
}

#[test]
fn runnable_task_carries_identity_and_command() -> TestResult {
    let mut wf = FlowBuilder::new("etl").unit("extract", "./extract.sh").compile();

    let step = wf.activate()?;
    let task = &step.newly_runnable[0];
    assert_eq!(task.instance_id, wf.instance_id());
    assert_eq!(task.flow_id, "etl");
    assert_eq!(task.id, "extract");
    assert_eq!(task.url, "/etl/extract");
    assert_eq!(task.command, "./extract.sh");
    Ok(())
}

#[test]
fn nested_group_unblocks_its_successor_in_one_step() -> TestResult {
    init_tracing();
    let mut wf = nested_flow().compile();

    let step = wf.activate()?;
    assert_eq!(step.runnable_urls(), vec!["/flow/g/x"]);
    assert_eq!(wf.state_of("/flow/g"), Some(TaskState::Active));
    assert_eq!(wf.state_of("/flow/z"), Some(TaskState::Inactive));

    let step = wf.report_completion("/flow/g/x", TaskOutcome::Success)?;
    assert_eq!(step.runnable_urls(), vec!["/flow/g/y"]);

    let step = wf.report_completion("/flow/g/y", TaskOutcome::Success)?;
    assert_eq!(wf.state_of("/flow/g"), Some(TaskState::Complete));
    assert_eq!(step.runnable_urls(), vec!["/flow/z"]);

    let step = wf.report_completion("/flow/z", TaskOutcome::Success)?;
    assert_eq!(step.flow_finished, Some(TaskState::Complete));
    assert_eq!(urls_in_state(&wf, TaskState::Complete).len(), 5);
    Ok(())
}

#[test]
fn failed_dependency_blocks_dependents_and_fails_flow() -> TestResult {
    let mut wf = fan_out_flow().compile();
    wf.activate()?;

    let step = wf.report_completion("/flow/a", TaskOutcome::Failed(1))?;
    assert!(step.newly_runnable.is_empty());
    assert_eq!(step.flow_finished, Some(TaskState::Failed));
    assert_eq!(wf.state_of("/flow/b"), Some(TaskState::Inactive));
    assert_eq!(wf.state_of("/flow/c"), Some(TaskState::Inactive));

    match wf.report_completion("/flow/b", TaskOutcome::Success) {
        Err(BatchflowError::InvalidTransition { from, .. }) => {
            assert_eq!(from, TaskState::Inactive);
        }
        Err(e) => panic!("Expected InvalidTransition, got {e:?}"),
        Ok(_) => panic!("Expected InvalidTransition, got Ok"),
    }
    Ok(())
}

#[test]
fn sibling_group_stops_dispatching_once_the_flow_fails() -> TestResult {
    init_tracing();
    let mut wf = FlowBuilder::new("flow")
        .group_in("flow", "g1", &[])
        .unit_in("g1", "a", "true")
        .unit_in_after("g1", "b", "true", &["a"])
        .group_in("flow", "g2", &[])
        .unit_in("g2", "c", "true")
        .unit_in_after("g2", "d", "true", &["c"])
        .compile();

    let step = wf.activate()?;
    assert_eq!(step.runnable_urls(), vec!["/flow/g1/a", "/flow/g2/c"]);

    let failed = wf.report_completion("/flow/g1/a", TaskOutcome::Failed(1))?;
    assert_eq!(failed.flow_finished, Some(TaskState::Failed));
    assert_eq!(wf.state_of("/flow/g2"), Some(TaskState::Active));

    let late = wf.report_completion("/flow/g2/c", TaskOutcome::Success)?;
    assert!(late.newly_runnable.is_empty());
    assert_eq!(wf.state_of("/flow/g2/c"), Some(TaskState::Complete));
    assert_eq!(wf.state_of("/flow/g2/d"), Some(TaskState::Inactive));
    assert_eq!(wf.state_of("/flow/g1/b"), Some(TaskState::Inactive));
    assert_eq!(wf.flow_state(), TaskState::Failed);
    Ok(())
}

#[test]
fn every_non_success_outcome_fails_the_task() -> TestResult {
    for outcome in [
        TaskOutcome::Failed(3),
        TaskOutcome::SpawnFailed,
        TaskOutcome::Cancelled,
        TaskOutcome::TimedOut,
    ] {
        let mut wf = fan_out_flow().compile();
        wf.activate()?;
        wf.report_completion("/flow/a", outcome)?;
        assert_eq!(wf.flow_state(), TaskState::Failed, "{outcome:?}");
    }
    Ok(())
}

#[test]
fn deep_cascade_completes_every_ancestor() -> TestResult {
    let mut wf = FlowBuilder::new("flow")
        .group_in("flow", "l1", &[])
        .group_in("l1", "l2", &[])
        .group_in("l2", "l3", &[])
        .unit_in("l3", "leaf", "true")
        .compile();

    let step = wf.activate()?;
    assert_eq!(step.runnable_urls(), vec!["/flow/l1/l2/l3/leaf"]);

    let step = wf.report_completion("/flow/l1/l2/l3/leaf", TaskOutcome::Success)?;
    let completed: Vec<&str> = step.state_changes.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        completed,
        vec![
            "/flow/l1/l2/l3/leaf",
            "/flow/l1/l2/l3",
            "/flow/l1/l2",
            "/flow/l1",
            "/flow",
        ]
    );
    assert_eq!(step.flow_finished, Some(TaskState::Complete));
    Ok(())
}

#[test]
fn sibling_groups_run_in_dependency_order() -> TestResult {
    let mut wf = FlowBuilder::new("flow")
        .group_in("flow", "stage1", &[])
        .unit_in("stage1", "s1a", "true")
        .unit_in("stage1", "s1b", "true")
        .group_in("flow", "stage2", &["stage1"])
        .unit_in("stage2", "s2", "true")
        .compile();

    let step = wf.activate()?;
    assert_eq!(step.runnable_urls(), vec!["/flow/stage1/s1a", "/flow/stage1/s1b"]);
    assert_eq!(wf.state_of("/flow/stage2"), Some(TaskState::Inactive));

    wf.report_completion("/flow/stage1/s1a", TaskOutcome::Success)?;
    let step = wf.report_completion("/flow/stage1/s1b", TaskOutcome::Success)?;
    assert_eq!(step.runnable_urls(), vec!["/flow/stage2/s2"]);
    assert_eq!(wf.state_of("/flow/stage2"), Some(TaskState::Active));
    Ok(())
}

#[test]
fn activating_an_active_flow_is_rejected() -> TestResult {
    let mut wf = fan_out_flow().compile();
    wf.activate()?;

    match wf.activate() {
        Err(BatchflowError::FlowAlreadyActive(flow)) => assert_eq!(flow, "flow"),
        Err(e) => panic!("Expected FlowAlreadyActive, got {e:?}"),
        Ok(_) => panic!("Expected FlowAlreadyActive, got Ok"),
    }
    assert_eq!(wf.state_of("/flow/a"), Some(TaskState::Active));
    Ok(())
}

#[test]
fn finished_flow_can_be_activated_again() -> TestResult {
    let mut wf = FlowBuilder::new("flow").unit("a", "true").compile();
    wf.activate()?;
    wf.report_completion("/flow/a", TaskOutcome::Success)?;
    assert_eq!(wf.flow_state(), TaskState::Complete);

    let step = wf.activate()?;
    assert_eq!(step.runnable_urls(), vec!["/flow/a"]);
    Ok(())
}

#[test]
fn duplicate_completion_is_ignored() -> TestResult {
    let mut wf = fan_out_flow().compile();
    wf.activate()?;
    wf.report_completion("/flow/a", TaskOutcome::Success)?;

    let again = wf.report_completion("/flow/a", TaskOutcome::Success)?;
    assert!(again.is_empty());
    assert_eq!(wf.state_of("/flow/b"), Some(TaskState::Active));
    Ok(())
}

#[test]
fn completion_for_a_group_is_rejected() -> TestResult {
    let mut wf = nested_flow().compile();
    wf.activate()?;

    match wf.report_completion("/flow/g", TaskOutcome::Success) {
        Err(BatchflowError::InvalidTransition { url, .. }) => assert_eq!(url, "/flow/g"),
        Err(e) => panic!("Expected InvalidTransition, got {e:?}"),
        Ok(_) => panic!("Expected InvalidTransition, got Ok"),
    }
    Ok(())
}

#[test]
fn abort_fails_root_and_leaves_running_units_to_report() -> TestResult {
    let mut wf = fan_out_flow().compile();
    wf.activate()?;

    let step = wf.abort(None)?;
    assert_eq!(step.flow_finished, Some(TaskState::Failed));
    assert_eq!(wf.state_of("/flow/a"), Some(TaskState::Active));

    let late = wf.report_completion("/flow/a", TaskOutcome::Cancelled)?;
    assert!(late.newly_runnable.is_empty());
    assert_eq!(late.flow_finished, None);

    match wf.abort(None) {
        Err(BatchflowError::AlreadyTerminal { state, .. }) => {
            assert_eq!(state, TaskState::Failed);
        }
        Err(e) => panic!("Expected AlreadyTerminal, got {e:?}"),
        Ok(_) => panic!("Expected AlreadyTerminal, got Ok"),
    }
    Ok(())
}

#[test]
fn aborting_one_task_fails_its_ancestors() -> TestResult {
    let mut wf = nested_flow().compile();
    wf.activate()?;

    let step = wf.abort(Some("/flow/g/x"))?;
    assert_eq!(step.flow_finished, Some(TaskState::Failed));
    assert_eq!(wf.state_of("/flow/g"), Some(TaskState::Failed));
    assert_eq!(wf.state_of("/flow/z"), Some(TaskState::Inactive));
    Ok(())
}

#[test]
fn aborting_a_waiting_task_fails_the_flow() -> TestResult {
    let mut wf = nested_flow().compile();
    wf.activate()?;

    let step = wf.abort(Some("/flow/z"))?;
    assert_eq!(wf.state_of("/flow/z"), Some(TaskState::Failed));
    assert_eq!(step.flow_finished, Some(TaskState::Failed));
    Ok(())
}

#[test]
fn restart_after_failure_starts_from_the_entry_points() -> TestResult {
    init_tracing();
    let mut wf = fan_out_flow().compile();
    wf.activate()?;
    wf.report_completion("/flow/a", TaskOutcome::Failed(1))?;

    let step = wf.restart()?;
    let first = &step.state_changes[0];
    assert_eq!(first.url, "/flow");
    assert_eq!(first.old, TaskState::Failed);
    assert_eq!(first.new, TaskState::Inactive);
    assert_eq!(step.runnable_urls(), vec!["/flow/a"]);
    assert_eq!(wf.state_of("/flow/b"), Some(TaskState::Inactive));
    Ok(())
}

#[test]
fn restart_of_a_running_flow_is_rejected() -> TestResult {
    let mut wf = fan_out_flow().compile();
    wf.activate()?;

    assert!(matches!(
        wf.restart(),
        Err(BatchflowError::InvalidTransition { .. })
    ));
    Ok(())
}

#[test]
fn instances_share_structure_but_not_state() -> TestResult {
    let template = fan_out_flow().compile();
    let mut first = template.new_instance();
    let second = template.new_instance();

    assert_ne!(first.instance_id(), second.instance_id());
    first.activate()?;
    assert_eq!(first.state_of("/flow/a"), Some(TaskState::Active));
    assert_eq!(second.state_of("/flow/a"), Some(TaskState::Inactive));
    assert_eq!(template.state_of("/flow"), Some(TaskState::Inactive));
    Ok(())
}
