//! Command-line argument definitions for tfharness.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Command-line interface for tfharness.
#[derive(Debug, Parser)]
#[command(name = "tfharness")]
#[command(
    author,
    version,
    about = "Typed execution harness for an infrastructure provisioning engine"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Engine binary to run.
    #[arg(long, global = true)]
    pub binary: Option<String>,

    /// Working directory holding the module configuration.
    #[arg(long, global = true)]
    pub dir: Option<Utf8PathBuf>,

    /// Abort the engine call after this many seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check the configuration without touching state.
    Validate,

    /// Initialize the working directory.
    Init(InitArgs),

    /// Select a workspace, creating it if needed.
    Workspace(WorkspaceArgs),

    /// Apply the configuration.
    Apply(MutateArgs),

    /// Destroy everything the configuration manages.
    Destroy(MutateArgs),

    /// Print module outputs as JSON.
    Output(OutputArgs),
}

/// Arguments for the `init` subcommand.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Copy this module source into the working directory first.
    #[arg(long)]
    pub from_module: Option<String>,
}

/// Arguments for the `workspace` subcommand.
#[derive(Debug, Args)]
pub struct WorkspaceArgs {
    /// Workspace name.
    #[arg(required = true)]
    pub name: String,
}

/// Arguments shared by the `apply` and `destroy` subcommands.
#[derive(Debug, Args)]
pub struct MutateArgs {
    /// Set an input variable, as NAME=VALUE. May be repeated.
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Load variables from a file. `.json` files are read as JSON.
    #[arg(long = "var-file", value_name = "PATH")]
    pub var_files: Vec<Utf8PathBuf>,

    /// Restrict the operation to a resource address. May be repeated.
    #[arg(long = "target", value_name = "ADDRESS")]
    pub targets: Vec<String>,

    /// Skip the state refresh before planning.
    #[arg(long)]
    pub no_refresh: bool,
}

/// Arguments for the `output` subcommand.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Print sensitive values instead of redacting them.
    #[arg(long)]
    pub show_sensitive: bool,
}
