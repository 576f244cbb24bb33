//! Lifecycle command orchestration.
//!
//! Builds a [`Harness`] from configuration and runs one lifecycle operation
//! on the supplied runtime handle. Cancellation flows in through the caller's
//! [`CancellationToken`], and the configured timeout bounds the call.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use smart_default::SmartDefault;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::CommandOutcome;
use crate::config::AppConfig;
use crate::engine::{
    BinaryResolver, CallContext, EngineInvoker, Harness, HarnessOption, VarFileFormat,
    with_refresh, with_target, with_var, with_var_file,
};
use crate::error::{ConfigError, FilesystemError, Result as HarnessResult};

/// Options shared by the `apply` and `destroy` commands.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct MutateRequest {
    /// Variables in `NAME=VALUE` form.
    pub vars: Vec<String>,
    /// Paths of variable files to load.
    pub var_files: Vec<Utf8PathBuf>,
    /// Resource addresses to restrict the operation to.
    pub targets: Vec<String>,
    /// Whether the engine refreshes state first.
    #[default(true)]
    pub refresh: bool,
}

/// One lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommand {
    /// Check the configuration.
    Validate,
    /// Initialize the working directory.
    Init {
        /// Optional module source copied in first.
        from_module: Option<String>,
    },
    /// Select or create a workspace.
    Workspace {
        /// Workspace name.
        name: String,
    },
    /// Apply the configuration.
    Apply(MutateRequest),
    /// Destroy managed resources.
    Destroy(MutateRequest),
    /// Read module outputs.
    Output,
}

/// Parameters for [`run_lifecycle`].
pub struct LifecycleParams<'a, E: mockable::Env> {
    /// Merged application configuration.
    pub config: &'a AppConfig,
    /// The operation to run.
    pub command: LifecycleCommand,
    /// Tokio runtime handle the operation is driven on.
    pub runtime_handle: &'a tokio::runtime::Handle,
    /// Environment provider for binary resolution.
    pub env: &'a E,
    /// Fires when the caller wants the call abandoned.
    pub cancel: CancellationToken,
}

/// Build a harness for the configured working directory.
///
/// # Errors
///
/// Returns [`ConfigError::MissingRequired`] when no working directory is
/// configured.
pub fn build_harness<E: mockable::Env>(config: &AppConfig, env: &E) -> HarnessResult<Harness> {
    let working_dir = config
        .working_dir
        .clone()
        .filter(|dir| !dir.as_str().is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            field: String::from("working_dir"),
        })?;
    let binary = BinaryResolver::new(env).resolve(config.binary_path.as_deref());

    let harness = config.engine.env.iter().fold(
        Harness::new(binary, working_dir)?.with_automation(config.engine.in_automation),
        |harness, (key, value)| harness.with_env(key, value),
    );
    Ok(harness)
}

/// Build the call context from the caller's token and the configured timeout.
#[must_use]
pub fn call_context(config: &AppConfig, cancel: CancellationToken) -> CallContext {
    let ctx = CallContext::with_token(cancel);
    match config.timeout() {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

/// Split a `NAME=VALUE` argument.
///
/// The value may itself contain `=`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when there is no `=` or the name is
/// empty.
pub fn parse_var(raw: &str) -> HarnessResult<HarnessOption> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok(with_var(name.trim(), value)),
        _ => Err(ConfigError::InvalidValue {
            field: String::from("var"),
            reason: format!("expected NAME=VALUE, got '{raw}'"),
        }
        .into()),
    }
}

/// Read a variable file, inferring its format from the extension.
///
/// # Errors
///
/// Returns [`FilesystemError::NotFound`] when the file does not exist, or
/// [`FilesystemError::IoError`] when it cannot be read.
pub fn read_var_file(path: &Utf8Path) -> HarnessResult<HarnessOption> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let Some(file_name) = path.file_name() else {
        return Err(FilesystemError::NotFound {
            path: path.as_std_path().to_path_buf(),
        }
        .into());
    };

    let content = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read(file_name))
        .map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                FilesystemError::NotFound {
                    path: path.as_std_path().to_path_buf(),
                }
            } else {
                FilesystemError::IoError {
                    path: path.as_std_path().to_path_buf(),
                    message: error.to_string(),
                }
            }
        })?;

    Ok(with_var_file(content, VarFileFormat::from_path(path)))
}

/// Translate a mutate request into harness options.
///
/// Variable files come first so that explicit variables override them.
///
/// # Errors
///
/// Returns the first variable parse or file read failure.
pub fn mutate_options(request: &MutateRequest) -> HarnessResult<Vec<HarnessOption>> {
    let mut options = request
        .var_files
        .iter()
        .map(|path| read_var_file(path))
        .collect::<HarnessResult<Vec<_>>>()?;
    for raw in &request.vars {
        options.push(parse_var(raw)?);
    }
    options.extend(request.targets.iter().map(with_target));
    if !request.refresh {
        options.push(with_refresh(false));
    }
    Ok(options)
}

/// Run one lifecycle operation against the configured working directory.
///
/// # Errors
///
/// Returns configuration errors for missing settings or malformed options,
/// filesystem errors for unreadable variable files, and classified engine
/// errors for everything the engine reports.
pub fn run_lifecycle<E: mockable::Env>(
    params: LifecycleParams<'_, E>,
) -> HarnessResult<CommandOutcome> {
    let LifecycleParams {
        config,
        command,
        runtime_handle,
        env,
        cancel,
    } = params;

    let harness = build_harness(config, env)?;
    let ctx = call_context(config, cancel);
    debug!(
        binary = harness.binary_path(),
        working_dir = %harness.working_dir(),
        ?command,
        "running lifecycle command"
    );
    runtime_handle.block_on(dispatch(&harness, &ctx, command))
}

/// Run `command` on an already built harness.
pub(crate) async fn dispatch<I: EngineInvoker>(
    harness: &Harness<I>,
    ctx: &CallContext,
    command: LifecycleCommand,
) -> HarnessResult<CommandOutcome> {
    match command {
        LifecycleCommand::Validate => harness.validate(ctx).await?,
        LifecycleCommand::Init { from_module } => {
            harness.init(ctx, from_module.as_deref()).await?;
        }
        LifecycleCommand::Workspace { name } => harness.workspace(ctx, &name).await?,
        LifecycleCommand::Apply(request) => {
            harness.apply(ctx, &mutate_options(&request)?).await?;
        }
        LifecycleCommand::Destroy(request) => {
            harness.destroy(ctx, &mutate_options(&request)?).await?;
        }
        LifecycleCommand::Output => {
            return Ok(CommandOutcome::Outputs(harness.output(ctx).await?));
        }
    }
    Ok(CommandOutcome::Success)
}
