//! Then step definitions for harness lifecycle scenarios.

use rstest_bdd_macros::then;
use tfharness::engine::OutputValue;
use tfharness::error::ErrorKind;

use super::StepResult;
use super::state::{CallOutcome, LifecycleState};

fn outcome(lifecycle_state: &LifecycleState) -> StepResult<CallOutcome> {
    lifecycle_state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))
}

#[then("the call succeeds")]
fn call_succeeds(lifecycle_state: &LifecycleState) -> StepResult<()> {
    match outcome(lifecycle_state)? {
        CallOutcome::Succeeded => Ok(()),
        CallOutcome::Failed { message, .. } => Err(format!("expected success, got: {message}")),
    }
}

#[then("the call fails with kind {expected}")]
fn call_fails_with_kind(lifecycle_state: &LifecycleState, expected: String) -> StepResult<()> {
    match outcome(lifecycle_state)? {
        CallOutcome::Failed {
            kind: Some(kind), ..
        } if kind.to_string() == expected => Ok(()),
        CallOutcome::Failed { kind, message } => Err(format!(
            "expected kind '{expected}', got {kind:?}: {message}"
        )),
        CallOutcome::Succeeded => Err(format!("expected kind '{expected}', got success")),
    }
}

#[then("the call fails with {count} configuration errors")]
fn call_fails_with_error_count(lifecycle_state: &LifecycleState, count: u64) -> StepResult<()> {
    match outcome(lifecycle_state)? {
        CallOutcome::Failed {
            kind: Some(ErrorKind::InvalidConfiguration { error_count }),
            ..
        } if error_count == count => Ok(()),
        CallOutcome::Failed { kind, message } => Err(format!(
            "expected {count} configuration errors, got {kind:?}: {message}"
        )),
        CallOutcome::Succeeded => Err(String::from("expected invalid configuration, got success")),
    }
}

#[then("the output {name} is {expected}")]
fn output_is(lifecycle_state: &LifecycleState, name: String, expected: String) -> StepResult<()> {
    let outputs = lifecycle_state
        .outputs
        .get()
        .ok_or_else(|| String::from("outputs should have been read"))?;
    let output = outputs
        .iter()
        .find(|output| output.name() == name)
        .ok_or_else(|| format!("output '{name}' should exist in {outputs:?}"))?;
    let rendered = match output.value() {
        OutputValue::String(value) => value.clone(),
        OutputValue::Bool(value) => value.to_string(),
        other => format!("{other:?}"),
    };
    if rendered == expected {
        Ok(())
    } else {
        Err(format!("expected output '{name}' to be {expected}, got {rendered}"))
    }
}

#[then("no staged variable files remain")]
fn no_staged_variable_files_remain(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let dir = lifecycle_state
        .work_dir
        .get()
        .ok_or_else(|| String::from("working directory should be configured"))?;
    let leftovers = dir.leftover_staged_files();
    if leftovers.is_empty() {
        Ok(())
    } else {
        Err(format!("staged files were left behind: {leftovers:?}"))
    }
}
