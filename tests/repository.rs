// tests/repository.rs

use std::error::Error;

use batchflow::dag::{CompileOptions, InstanceId};
use batchflow::engine::{FlowRepository, TaskOutcome};
use batchflow::errors::{BatchflowError, CompileError};
use batchflow::types::TaskState;
use batchflow_test_utils::{FlowBuilder, fan_out_flow, init_tracing, nested_flow};

type TestResult = Result<(), Box<dyn Error>>;

fn repo_with_fan_out() -> FlowRepository {
    let mut repo = FlowRepository::new(CompileOptions::default());
    repo.register("nightly", &fan_out_flow().build())
        .expect("register fan-out flow");
    repo
}

#[test]
fn register_and_start_a_flow() -> TestResult {
    init_tracing();
    let mut repo = repo_with_fan_out();
    assert_eq!(repo.flows(), vec!["nightly"]);
    assert_eq!(repo.flow_state("nightly"), None);

    let (instance, step) = repo.start("nightly")?;
    assert_eq!(step.runnable_urls(), vec!["/flow/a"]);
    assert_eq!(step.newly_runnable[0].flow_id, "nightly");
    assert_eq!(repo.live_instances("nightly"), vec![instance]);
    assert_eq!(repo.flow_state("nightly"), Some(TaskState::Active));
    assert!(!repo.is_idle());
    Ok(())
}

#[test]
fn failed_registration_leaves_repository_untouched() {
    let mut repo = FlowRepository::new(CompileOptions::default());
    let bad = FlowBuilder::new("flow")
        .unit_after("b", "true", &["ghost"])
        .build();

    match repo.register("bad", &bad) {
        Err(BatchflowError::Compile(CompileError::UnresolvedDependency { dependency, .. })) => {
            assert_eq!(dependency, "ghost");
        }
        Err(e) => panic!("Expected Compile(UnresolvedDependency), got {e:?}"),
        Ok(_) => panic!("Expected compile error, got Ok"),
    }
    assert!(repo.flows().is_empty());
    assert!(repo.template("bad").is_none());
}

#[test]
fn start_refuses_a_second_active_instance_but_launch_allows_it() -> TestResult {
    let mut repo = repo_with_fan_out();
    repo.start("nightly")?;

    match repo.start("/nightly") {
        Err(BatchflowError::FlowAlreadyActive(flow)) => assert_eq!(flow, "nightly"),
        Err(e) => panic!("Expected FlowAlreadyActive, got {e:?}"),
        Ok(_) => panic!("Expected FlowAlreadyActive, got Ok"),
    }

    let (second, _) = repo.launch("nightly")?;
    assert_eq!(repo.live_instances("nightly").len(), 2);
    assert!(repo.instance(second).is_some());
    Ok(())
}

#[test]
fn instances_progress_independently() -> TestResult {
    let mut repo = repo_with_fan_out();
    let (first, _) = repo.launch("nightly")?;
    let (second, _) = repo.launch("nightly")?;

    let step = repo
        .complete(first, "/flow/a", TaskOutcome::Success)?
        .expect("first instance is live");
    assert_eq!(step.runnable_urls(), vec!["/flow/b", "/flow/c"]);

    let other = repo.instance(second).expect("second instance is live");
    assert_eq!(other.state_of("/flow/a"), Some(TaskState::Active));
    assert_eq!(other.state_of("/flow/b"), Some(TaskState::Inactive));
    Ok(())
}

#[test]
fn finished_instance_is_evicted_and_state_remembered() -> TestResult {
    let mut repo = repo_with_fan_out();
    let (instance, _) = repo.start("nightly")?;

    repo.complete(instance, "/flow/a", TaskOutcome::Success)?;
    repo.complete(instance, "/flow/b", TaskOutcome::Success)?;
    let last = repo
        .complete(instance, "/flow/c", TaskOutcome::Success)?
        .expect("instance still live before final completion");

    assert_eq!(last.flow_finished, Some(TaskState::Complete));
    assert!(repo.instance(instance).is_none());
    assert!(repo.is_idle());
    assert_eq!(repo.flow_state("nightly"), Some(TaskState::Complete));

    // A late report for the evicted instance is ignored.
    assert!(repo.complete(instance, "/flow/c", TaskOutcome::Success)?.is_none());
    Ok(())
}

#[test]
fn completion_for_unknown_instance_is_ignored() -> TestResult {
    let mut repo = repo_with_fan_out();
    assert!(repo
        .complete(InstanceId::new(), "/flow/a", TaskOutcome::Success)?
        .is_none());
    Ok(())
}

#[test]
fn bad_completion_keeps_instance_live() -> TestResult {
    let mut repo = repo_with_fan_out();
    let (instance, _) = repo.start("nightly")?;

    assert!(matches!(
        repo.complete(instance, "/flow/b", TaskOutcome::Success),
        Err(BatchflowError::InvalidTransition { .. })
    ));
    assert!(repo.instance(instance).is_some());
    Ok(())
}

#[test]
fn abort_whole_flow() -> TestResult {
    let mut repo = repo_with_fan_out();
    let (instance, _) = repo.start("nightly")?;

    let (aborted, step) = repo.abort("nightly", None)?;
    assert_eq!(aborted, instance);
    assert_eq!(step.flow_finished, Some(TaskState::Failed));
    assert!(repo.is_idle());
    assert_eq!(repo.flow_state("nightly"), Some(TaskState::Failed));

    match repo.abort("nightly", None) {
        Err(BatchflowError::AlreadyTerminal { url, state }) => {
            assert_eq!(url, "/nightly");
            assert_eq!(state, TaskState::Failed);
        }
        Err(e) => panic!("Expected AlreadyTerminal, got {e:?}"),
        Ok(_) => panic!("Expected AlreadyTerminal, got Ok"),
    }
    Ok(())
}

#[test]
fn abort_single_task_by_id() -> TestResult {
    let mut repo = FlowRepository::new(CompileOptions::default());
    repo.register("etl", &nested_flow().build())?;
    let (instance, _) = repo.start("etl")?;

    let (_, step) = repo.abort("etl", Some("x"))?;
    let urls: Vec<&str> = step.state_changes.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, vec!["/flow/g/x", "/flow/g", "/flow"]);
    assert!(repo.instance(instance).is_none());
    Ok(())
}

#[test]
fn abort_errors() -> TestResult {
    let mut repo = repo_with_fan_out();

    assert!(matches!(
        repo.abort("missing", None),
        Err(BatchflowError::FlowNotFound(_))
    ));
    assert!(matches!(
        repo.abort("nightly", None),
        Err(BatchflowError::FlowNotFound(_))
    ));

    let (instance, _) = repo.start("nightly")?;
    assert!(matches!(
        repo.abort("nightly", Some("/flow/nope")),
        Err(BatchflowError::TaskNotFound(_))
    ));
    assert!(repo.instance(instance).is_some());
    Ok(())
}

#[test]
fn start_unknown_flow() {
    let mut repo = FlowRepository::default();
    match repo.start("ghost") {
        Err(BatchflowError::FlowNotFound(flow)) => assert_eq!(flow, "ghost"),
        Err(e) => panic!("Expected FlowNotFound, got {e:?}"),
        Ok(_) => panic!("Expected FlowNotFound, got Ok"),
    }
}

#[test]
fn fail_instance_forces_failure() -> TestResult {
    let mut repo = repo_with_fan_out();
    let (instance, _) = repo.start("nightly")?;

    let step = repo.fail_instance(instance).expect("instance is live");
    assert_eq!(step.flow_finished, Some(TaskState::Failed));
    assert!(repo.is_idle());
    assert_eq!(repo.flow_state("nightly"), Some(TaskState::Failed));
    assert!(repo.fail_instance(instance).is_none());
    Ok(())
}

#[test]
fn trivial_flow_finishes_at_launch() -> TestResult {
    let mut repo = FlowRepository::default();
    repo.register("solo", &FlowBuilder::new("solo").build())?;

    let (_, step) = repo.start("solo")?;
    assert_eq!(step.flow_finished, Some(TaskState::Complete));
    assert!(repo.is_idle());
    Ok(())
}
