//! Typed execution harness for an infrastructure provisioning engine.
//!
//! `tfharness` drives an external provisioning tool (the "engine") as a
//! subprocess and exposes its lifecycle as typed operations: validate,
//! initialize, select or create a workspace, apply, destroy, and read
//! outputs. The engine stays a black box. The harness builds its
//! invocations, stages the variable files it reads, runs it under caller
//! controlled cancellation, and translates its diagnostics into a stable
//! error taxonomy.
//!
//! # Modules
//!
//! - [`engine`]: The harness, its options, and the process seam
//! - [`api`]: Command orchestration shared by the CLI and embedders
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`error`]: Semantic error types for the application
//! - [`logging`]: Tracing subscriber set-up for the binary

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
