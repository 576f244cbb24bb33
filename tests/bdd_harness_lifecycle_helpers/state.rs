//! Scenario state for harness lifecycle behavioural tests.

use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tfharness::engine::{HarnessOption, Output};
use tfharness::error::ErrorKind;

use crate::support::WorkDir;

/// Result of the most recent harness call.
#[derive(Debug, Clone)]
pub(crate) enum CallOutcome {
    /// The call returned `Ok`.
    Succeeded,
    /// The call returned an error.
    Failed {
        /// Semantic kind, when the engine's failure was classified.
        kind: Option<ErrorKind>,
        /// Rendered error message.
        message: String,
    },
}

#[derive(Default, ScenarioState)]
pub(crate) struct LifecycleState {
    /// Keeps a scratch working directory alive for the scenario.
    pub(crate) work_dir: Slot<Arc<WorkDir>>,
    /// Directory the harness runs in.
    pub(crate) module_dir: Slot<Utf8PathBuf>,
    /// Options passed to apply and destroy.
    pub(crate) options: Slot<Vec<HarnessOption>>,
    /// Whether calls run with an already expired deadline.
    pub(crate) deadline_passed: Slot<bool>,
    /// Outcome of the last call.
    pub(crate) outcome: Slot<CallOutcome>,
    /// Outputs from the last successful output call.
    pub(crate) outputs: Slot<Vec<Output>>,
}

#[fixture]
pub(crate) fn lifecycle_state() -> LifecycleState {
    let state = LifecycleState::default();
    state.options.set(Vec::new());
    state.deadline_passed.set(false);
    state
}
