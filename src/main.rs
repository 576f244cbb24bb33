//! `tfharness` application entry point.
//!
//! This binary drives the provisioning engine against one working directory.
//! It uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/tfharness/config.toml` or path from `TFHARNESS_CONFIG_PATH`)
//! 3. Environment variables (`TFHARNESS_*`)
//! 4. Command-line arguments

use clap::Parser;
use eyre::{Report, Result as EyreResult, WrapErr};
use mockable::DefaultEnv;
use tfharness::api::{
    CommandOutcome, LifecycleCommand, LifecycleParams, MutateRequest, OutputsReport,
    run_lifecycle,
};
use tfharness::config::{AppConfig, Cli, Commands, MutateArgs, load_config};
use tfharness::engine::Output;
use tfharness::logging;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Application entry point.
///
/// Loads configuration with layered precedence via `OrthoConfig`, then runs
/// the requested lifecycle command on a Tokio runtime. Ctrl-C cancels the
/// in-flight engine call.
fn main() -> EyreResult<()> {
    logging::init();

    // Parse CLI first (for subcommand dispatch and global options).
    let cli = Cli::parse();

    // Load configuration with layered precedence: defaults < file < env < CLI.
    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = Runtime::new().wrap_err("failed to start the async runtime")?;
    let cancel = CancellationToken::new();
    runtime.spawn(cancel_on_interrupt(cancel.clone()));

    let outcome = run(&cli, &config, &runtime, cancel).map_err(Report::from)?;
    report(&cli.command, &outcome)
}

/// Execute the CLI command, returning domain-specific errors.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`.
fn run(
    cli: &Cli,
    config: &AppConfig,
    runtime: &Runtime,
    cancel: CancellationToken,
) -> tfharness::error::Result<CommandOutcome> {
    let env = DefaultEnv::new();
    run_lifecycle(LifecycleParams {
        config,
        command: lifecycle_command(&cli.command),
        runtime_handle: runtime.handle(),
        env: &env,
        cancel,
    })
}

fn lifecycle_command(command: &Commands) -> LifecycleCommand {
    match command {
        Commands::Validate => LifecycleCommand::Validate,
        Commands::Init(args) => LifecycleCommand::Init {
            from_module: args.from_module.clone(),
        },
        Commands::Workspace(args) => LifecycleCommand::Workspace {
            name: args.name.clone(),
        },
        Commands::Apply(args) => LifecycleCommand::Apply(mutate_request(args)),
        Commands::Destroy(args) => LifecycleCommand::Destroy(mutate_request(args)),
        Commands::Output(_) => LifecycleCommand::Output,
    }
}

fn mutate_request(args: &MutateArgs) -> MutateRequest {
    MutateRequest {
        vars: args.vars.clone(),
        var_files: args.var_files.clone(),
        targets: args.targets.clone(),
        refresh: !args.no_refresh,
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling engine call");
        cancel.cancel();
    }
}

/// Print the command result.
fn report(command: &Commands, outcome: &CommandOutcome) -> EyreResult<()> {
    match outcome {
        CommandOutcome::Success => Ok(()),
        CommandOutcome::Outputs(outputs) => {
            let show_sensitive = matches!(command, Commands::Output(args) if args.show_sensitive);
            print_outputs(outputs, show_sensitive)
        }
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_outputs(outputs: &[Output], show_sensitive: bool) -> EyreResult<()> {
    let document = serde_json::to_string_pretty(&OutputsReport::new(outputs, show_sensitive))
        .wrap_err("failed to render outputs")?;
    println!("{document}");
    Ok(())
}
