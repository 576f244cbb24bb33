//! Configuration system for tfharness.
//!
//! This module provides the configuration structures and CLI definitions for the
//! tfharness binary. Configuration loading and precedence merging is handled by
//! the `ortho_config` crate. Precedence: CLI flags override environment
//! variables, which override configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/tfharness/config.toml` by
//! default, or `.tfharness.toml` in the current directory.
//!
//! # Example Configuration
//!
//! ```toml
//! binary_path = "/usr/local/bin/terraform"
//! working_dir = "/srv/provision/network"
//! timeout_secs = 1800
//!
//! [engine]
//! in_automation = true
//!
//! [engine.env]
//! TF_LOG = "WARN"
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, InitArgs, MutateArgs, OutputArgs, WorkspaceArgs};
pub use loader::{env_var_names, load_config};
pub use types::{AppConfig, EngineConfig};
