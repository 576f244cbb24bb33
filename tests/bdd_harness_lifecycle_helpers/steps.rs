//! Given and When step definitions for harness lifecycle scenarios.

use std::sync::Arc;

use rstest_bdd_macros::{given, when};
use tfharness::engine::{
    CallContext, Harness, VarFileFormat, with_var, with_var_file,
};
use tfharness::error::Result as HarnessResult;
use tokio::runtime::Runtime;
use tokio::time::Instant;

use super::StepResult;
use super::state::{CallOutcome, LifecycleState};
use crate::support::{fake_harness, testdata, work_dir};

fn runtime() -> StepResult<Runtime> {
    Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))
}

fn harness(lifecycle_state: &LifecycleState) -> StepResult<Harness> {
    let dir = lifecycle_state
        .module_dir
        .get()
        .ok_or_else(|| String::from("working directory should be configured"))?;
    Ok(fake_harness(&dir))
}

fn context(lifecycle_state: &LifecycleState) -> CallContext {
    let ctx = CallContext::background();
    if lifecycle_state.deadline_passed.get().unwrap_or(false) {
        ctx.with_deadline(Instant::now())
    } else {
        ctx
    }
}

fn record(lifecycle_state: &LifecycleState, result: &HarnessResult<()>) {
    let outcome = match result {
        Ok(()) => CallOutcome::Succeeded,
        Err(error) => CallOutcome::Failed {
            kind: error.kind(),
            message: error.to_string(),
        },
    };
    lifecycle_state.outcome.set(outcome);
}

fn use_fresh_work_dir(lifecycle_state: &LifecycleState) {
    let dir = work_dir();
    lifecycle_state.module_dir.set(dir.path().to_owned());
    lifecycle_state.work_dir.set(Arc::new(dir));
}

fn initialize(lifecycle_state: &LifecycleState, source: &str) -> StepResult<HarnessResult<()>> {
    let harness = harness(lifecycle_state)?;
    let ctx = CallContext::background();
    Ok(runtime()?.block_on(harness.init(&ctx, Some(source))))
}

#[given("the testdata module {module}")]
fn testdata_module(lifecycle_state: &LifecycleState, module: String) {
    lifecycle_state.module_dir.set(testdata(&module));
}

#[given("an empty working directory")]
fn empty_working_directory(lifecycle_state: &LifecycleState) {
    use_fresh_work_dir(lifecycle_state);
}

#[given("a working directory initialized from {module}")]
fn initialized_working_directory(
    lifecycle_state: &LifecycleState,
    module: String,
) -> StepResult<()> {
    use_fresh_work_dir(lifecycle_state);
    let source = testdata(&module);
    initialize(lifecycle_state, source.as_str())?
        .map_err(|e| format!("init from {module} should succeed: {e}"))
}

#[given("the directory failed to initialize from {source}")]
fn failed_initialization(lifecycle_state: &LifecycleState, source: String) -> StepResult<()> {
    match initialize(lifecycle_state, &source)? {
        Ok(()) => Err(format!("init from {source} should have failed")),
        Err(_) => Ok(()),
    }
}

#[given("the variable {name} is set to {value}")]
fn variable_is_set(lifecycle_state: &LifecycleState, name: String, value: String) {
    let mut options = lifecycle_state.options.get().unwrap_or_default();
    options.push(with_var(name, value));
    lifecycle_state.options.set(options);
}

#[given("a {format} variable file sets {name} to {value}")]
fn variable_file_sets(
    lifecycle_state: &LifecycleState,
    format: String,
    name: String,
    value: String,
) -> StepResult<()> {
    let option = match format.as_str() {
        "hcl" => with_var_file(format!("{name} = \"{value}\"\n"), VarFileFormat::Hcl),
        "json" => with_var_file(format!("{{\"{name}\":\"{value}\"}}"), VarFileFormat::Json),
        other => return Err(format!("unknown variable file format: {other}")),
    };
    let mut options = lifecycle_state.options.get().unwrap_or_default();
    options.push(option);
    lifecycle_state.options.set(options);
    Ok(())
}

#[given("the engine state records the output {name} as {value}")]
fn engine_state_records_output(
    lifecycle_state: &LifecycleState,
    name: String,
    value: String,
) -> StepResult<()> {
    let dir = lifecycle_state
        .work_dir
        .get()
        .ok_or_else(|| String::from("working directory should be configured"))?;
    dir.seed_outputs(&format!(
        "{{\"{name}\":{{\"sensitive\":false,\"type\":\"bool\",\"value\":{value}}}}}"
    ));
    Ok(())
}

#[given("the call deadline has already passed")]
fn deadline_has_passed(lifecycle_state: &LifecycleState) {
    lifecycle_state.deadline_passed.set(true);
}

#[when("the configuration is validated")]
fn configuration_is_validated(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let harness = harness(lifecycle_state)?;
    let result = runtime()?.block_on(harness.validate(&context(lifecycle_state)));
    record(lifecycle_state, &result);
    Ok(())
}

#[when("the workspace {name} is selected")]
fn workspace_is_selected(lifecycle_state: &LifecycleState, name: String) -> StepResult<()> {
    let harness = harness(lifecycle_state)?;
    let result = runtime()?.block_on(harness.workspace(&context(lifecycle_state), &name));
    record(lifecycle_state, &result);
    Ok(())
}

#[when("the directory is initialized from {source}")]
fn directory_is_initialized(lifecycle_state: &LifecycleState, source: String) -> StepResult<()> {
    let result = initialize(lifecycle_state, &source)?;
    record(lifecycle_state, &result);
    Ok(())
}

#[when("the configuration is applied")]
fn configuration_is_applied(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let harness = harness(lifecycle_state)?;
    let options = lifecycle_state.options.get().unwrap_or_default();
    let result = runtime()?.block_on(harness.apply(&context(lifecycle_state), &options));
    record(lifecycle_state, &result);
    Ok(())
}

#[when("the configuration is destroyed")]
fn configuration_is_destroyed(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let harness = harness(lifecycle_state)?;
    let options = lifecycle_state.options.get().unwrap_or_default();
    let result = runtime()?.block_on(harness.destroy(&context(lifecycle_state), &options));
    record(lifecycle_state, &result);
    Ok(())
}

#[when("the outputs are read")]
fn outputs_are_read(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let harness = harness(lifecycle_state)?;
    let result = runtime()?.block_on(harness.output(&context(lifecycle_state)));
    match result {
        Ok(outputs) => {
            lifecycle_state.outputs.set(outputs);
            lifecycle_state.outcome.set(CallOutcome::Succeeded);
        }
        Err(error) => record(lifecycle_state, &Err(error)),
    }
    Ok(())
}
