//! Orchestration API for tfharness commands.
//!
//! This module turns resolved configuration into harness calls. It is the
//! layer between the CLI adapter and [`crate::engine`]: it resolves the engine
//! binary, reads caller-supplied variable files, builds the call context, and
//! drives one lifecycle operation to completion on a Tokio runtime.
//!
//! Functions here accept library-owned types (not clap types) and return
//! [`crate::error::Result<CommandOutcome>`]. They do not print to
//! stdout/stderr or call `std::process::exit`.

mod lifecycle;
mod report;

pub use lifecycle::{
    LifecycleCommand, LifecycleParams, MutateRequest, build_harness, call_context,
    mutate_options, parse_var, read_var_file, run_lifecycle,
};
pub use report::{OutputsReport, REDACTED};

use crate::engine::Output;

/// Outcome of a tfharness command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The operation completed without producing data.
    Success,
    /// The module outputs, sorted by name.
    Outputs(Vec<Output>),
}
