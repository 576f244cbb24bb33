//! The harness façade.
//!
//! A [`Harness`] owns one engine binary path and one working directory and
//! exposes the engine's lifecycle as typed async operations. Each operation
//! spawns exactly one engine process (workspace may spawn two) and waits for
//! it or for the caller's [`CallContext`] to fire.
//!
//! The harness performs no internal locking. Callers that share a working
//! directory across tasks use [`SharedHarness`] to hold one lock across a
//! sequence of operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::{Mutex, MutexGuard, TryLockError};
use tracing::debug;

use super::classify::{classify, classify_validation};
use super::options::{HarnessOption, ResolvedOptions};
use super::output::{Output, decode_outputs};
use super::process::{ENGINE_TARGET, EngineInvoker, Invocation, InvocationOutput, ProcessInvoker};
use super::varfile::StagedVarFiles;
use super::CallContext;
use crate::error::{ClassifiedError, ConfigError, FilesystemError, Operation, ProcessError, Result};

/// Environment variable that tells the engine it runs unattended.
const AUTOMATION_ENV_VAR: &str = "TF_IN_AUTOMATION";

/// Arguments shared by every mutating command.
const UNATTENDED_ARGS: [&str; 2] = ["-input=false", "-no-color"];

/// Typed driver for one engine working directory.
///
/// # Example
///
/// ```no_run
/// use tfharness::engine::{CallContext, Harness, with_var};
///
/// # async fn provision() -> tfharness::error::Result<()> {
/// let harness = Harness::new("terraform", "/srv/provision/network")?;
/// let ctx = CallContext::background();
/// harness.init(&ctx, None).await?;
/// harness.workspace(&ctx, "staging").await?;
/// harness.apply(&ctx, &[with_var("region", "eu-west-1")]).await?;
/// for output in harness.output(&ctx).await? {
///     println!("{} = {:?}", output.name(), output.value());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Harness<I = ProcessInvoker> {
    binary_path: String,
    working_dir: Utf8PathBuf,
    env: BTreeMap<String, String>,
    in_automation: bool,
    invoker: I,
}

impl Harness<ProcessInvoker> {
    /// Create a harness that runs `binary_path` in `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] when either value is empty.
    pub fn new(
        binary_path: impl Into<String>,
        working_dir: impl Into<Utf8PathBuf>,
    ) -> Result<Self> {
        let binary = binary_path.into();
        let dir = working_dir.into();
        if binary.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: String::from("binary_path"),
            }
            .into());
        }
        if dir.as_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: String::from("working_dir"),
            }
            .into());
        }
        Ok(Self {
            binary_path: binary,
            working_dir: dir,
            env: BTreeMap::new(),
            in_automation: true,
            invoker: ProcessInvoker::default(),
        })
    }
}

impl<I> Harness<I> {
    /// Replace the process invoker.
    #[must_use]
    pub fn with_invoker<J>(self, invoker: J) -> Harness<J> {
        Harness {
            binary_path: self.binary_path,
            working_dir: self.working_dir,
            env: self.env,
            in_automation: self.in_automation,
            invoker,
        }
    }

    /// Add an environment variable to every engine process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Control whether `TF_IN_AUTOMATION=1` is passed to the engine.
    #[must_use]
    pub const fn with_automation(mut self, in_automation: bool) -> Self {
        self.in_automation = in_automation;
        self
    }

    /// The engine binary.
    #[must_use]
    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    /// The working directory every command runs in.
    #[must_use]
    pub fn working_dir(&self) -> &Utf8Path {
        &self.working_dir
    }
}

impl<I: EngineInvoker> Harness<I> {
    /// Check the configuration without touching state.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfiguration` error carrying the number of errors
    /// the engine found, or another classified error if validation could not
    /// run.
    pub async fn validate(&self, ctx: &CallContext) -> Result<()> {
        let output = self
            .execute(ctx, Operation::Validate, vec![
                String::from("validate"),
                String::from("-json"),
                String::from("-no-color"),
            ])
            .await?;
        Ok(classify_validation(&output)?)
    }

    /// Select the workspace `name`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a classified error when creation also fails, carrying the
    /// diagnostics of both steps, or `Canceled` when the context fires during
    /// either step.
    pub async fn workspace(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let selected = self
            .execute(ctx, Operation::Workspace, workspace_args("select", name))
            .await?;
        if selected.success() {
            return Ok(());
        }

        debug!(
            target: ENGINE_TARGET,
            workspace = name,
            "workspace not selectable, creating it"
        );
        let created = self
            .execute(ctx, Operation::Workspace, workspace_args("new", name))
            .await?;
        Ok(classify(Operation::Workspace, &created)
            .map_err(|error| error.with_earlier_diagnostic(&selected.stderr_lossy()))?)
    }

    /// Initialize the working directory, optionally copying a module first.
    ///
    /// Local module sources (`./`, `../`, or absolute paths) are made absolute
    /// against the current process directory before the engine sees them;
    /// other sources are passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ModuleNotFound` when the source cannot be resolved, or another
    /// classified error for other failures.
    pub async fn init(&self, ctx: &CallContext, source_module: Option<&str>) -> Result<()> {
        let mut args = vec![String::from("init")];
        args.extend(UNATTENDED_ARGS.iter().map(|arg| (*arg).to_owned()));
        if let Some(source) = source_module.filter(|source| !source.is_empty()) {
            let resolved = resolve_module_source(source)?;
            args.push(format!("-from-module={resolved}"));
        }

        let output = self.execute(ctx, Operation::Init, args).await?;
        Ok(classify(Operation::Init, &output)?)
    }

    /// Apply the configuration with the given options.
    ///
    /// # Errors
    ///
    /// Returns a classified error such as `NoConfigurationFiles` or
    /// `UndeclaredVariable`, or a filesystem error if a variable file cannot
    /// be staged.
    pub async fn apply(&self, ctx: &CallContext, options: &[HarnessOption]) -> Result<()> {
        self.mutate(ctx, Operation::Apply, options).await
    }

    /// Destroy everything the configuration manages.
    ///
    /// Accepts the same options as [`Harness::apply`]. Success does not imply
    /// that anything was ever applied: the engine reports success for a
    /// directory that failed to initialize.
    ///
    /// # Errors
    ///
    /// Returns a classified error when the engine fails.
    pub async fn destroy(&self, ctx: &CallContext, options: &[HarnessOption]) -> Result<()> {
        self.mutate(ctx, Operation::Destroy, options).await
    }

    /// Read every declared output, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `DecodeFailure` when the engine's document does not match the
    /// output model, or another classified error when the engine fails.
    pub async fn output(&self, ctx: &CallContext) -> Result<Vec<Output>> {
        let output = self
            .execute(ctx, Operation::Output, vec![
                String::from("output"),
                String::from("-json"),
            ])
            .await?;
        classify(Operation::Output, &output)?;
        Ok(decode_outputs(output.stdout())?)
    }

    async fn mutate(
        &self,
        ctx: &CallContext,
        operation: Operation,
        options: &[HarnessOption],
    ) -> Result<()> {
        let resolved = ResolvedOptions::resolve(options);
        let staged = StagedVarFiles::stage(&self.working_dir, resolved.var_files())?;

        let mut args = vec![operation.subcommand().to_owned()];
        args.extend(UNATTENDED_ARGS.iter().map(|arg| (*arg).to_owned()));
        args.push(String::from("-auto-approve"));
        args.extend(resolved.arguments(staged.names()));

        let output = self.execute(ctx, operation, args).await;
        drop(staged);
        Ok(classify(operation, &output?)?)
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        operation: Operation,
        args: Vec<String>,
    ) -> Result<InvocationOutput> {
        let mut invocation = Invocation::new(&self.binary_path, self.working_dir.clone())
            .with_args(args)
            .with_env(self.env.iter().map(|(key, value)| (key.clone(), value.clone())));
        if self.in_automation {
            invocation = invocation.with_env([(AUTOMATION_ENV_VAR, "1")]);
        }

        self.invoker
            .invoke(ctx, invocation)
            .await
            .map_err(|error| match error {
                ProcessError::Canceled { cause } => {
                    ClassifiedError::canceled(operation, cause).into()
                }
                other => other.into(),
            })
    }
}

fn workspace_args(action: &str, name: &str) -> Vec<String> {
    vec![
        String::from("workspace"),
        action.to_owned(),
        name.to_owned(),
    ]
}

/// Make a local module source absolute against the current process directory.
fn resolve_module_source(source: &str) -> Result<String> {
    let path = Utf8Path::new(source);
    let is_local = source.starts_with("./")
        || source.starts_with("../")
        || source == "."
        || source == "..";
    if path.is_absolute() || !is_local {
        return Ok(source.to_owned());
    }

    let current = std::env::current_dir().map_err(|error| FilesystemError::IoError {
        path: std::path::PathBuf::from("."),
        message: format!("failed to read current directory: {error}"),
    })?;
    let base = Utf8PathBuf::from_path_buf(current).map_err(|path| FilesystemError::IoError {
        path,
        message: String::from("current directory is not valid UTF-8"),
    })?;
    Ok(base.join(path).into_string())
}

/// A harness shared between tasks behind an async mutex.
///
/// Holding the guard returned by [`SharedHarness::lock`] gives exclusive use
/// of the working directory across any number of operations.
#[derive(Debug)]
pub struct SharedHarness<I = ProcessInvoker> {
    inner: Arc<Mutex<Harness<I>>>,
}

impl<I> Clone for SharedHarness<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I> SharedHarness<I> {
    /// Wrap `harness` for shared use.
    #[must_use]
    pub fn new(harness: Harness<I>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(harness)),
        }
    }

    /// Wait for exclusive access to the harness.
    pub async fn lock(&self) -> MutexGuard<'_, Harness<I>> {
        self.inner.lock().await
    }

    /// Take exclusive access only if no other holder exists.
    ///
    /// # Errors
    ///
    /// Returns [`TryLockError`] while another task holds the lock.
    pub fn try_lock(&self) -> std::result::Result<MutexGuard<'_, Harness<I>>, TryLockError> {
        self.inner.try_lock()
    }
}
