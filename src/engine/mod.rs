//! Typed driver for the infrastructure provisioning engine.
//!
//! The engine is an opaque command-line tool run as a subprocess. This module
//! builds its invocations, stages the variable files it reads, runs it under
//! caller-controlled cancellation, and turns its output into typed results:
//!
//! - [`Harness`]: lifecycle operations over one working directory
//! - [`HarnessOption`]: variables, variable files, targets, and refresh control
//! - [`CallContext`]: cancellation and deadline for a single call
//! - [`EngineInvoker`]: the process seam, implemented by [`ProcessInvoker`]
//! - [`Output`]: decoded module outputs
//! - [`BinaryResolver`]: configured path, then `TF_BINARY`, then `terraform`

mod binary;
mod classify;
mod context;
mod harness;
mod options;
mod output;
mod process;
mod varfile;

pub use binary::{BINARY_ENV_VAR, BinaryResolver};
pub use classify::{
    DIAGNOSTIC_SIGNATURES, classify, classify_validation, error_summary, kind_for_summary,
};
pub use context::CallContext;
pub use harness::{Harness, SharedHarness};
pub use options::{
    HarnessOption, ResolvedOptions, with_refresh, with_target, with_var, with_var_file,
};
pub use output::{Output, OutputType, OutputValue, decode_outputs};
pub use process::{
    DEFAULT_INTERRUPT_GRACE, EngineInvoker, Invocation, InvocationOutput, InvokeFuture,
    ProcessInvoker,
};
pub use varfile::{STAGED_PREFIX, StagedVarFiles, VarFile, VarFileFormat};
