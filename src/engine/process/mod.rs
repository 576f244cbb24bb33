//! Engine subprocess invocation.
//!
//! This module runs the engine binary behind a small trait seam so that the
//! harness can be unit-tested without spawning real processes. The production
//! [`ProcessInvoker`] captures stdout and stderr as separate byte streams and
//! terminates the child when the caller's [`CallContext`] fires.
//!
//! On Unix the engine runs as the leader of its own process group. Cancellation
//! interrupts the whole group, gives the engine a grace period to release its
//! state lock, and then kills whatever is left in the group, provider plugins
//! included.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use super::CallContext;
use crate::error::ProcessError;

/// Tracing target for engine process operations.
pub(crate) const ENGINE_TARGET: &str = "tfharness::engine";

/// How long an interrupted engine may take to exit before it is killed.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(10);

/// Boxed future type returned by [`EngineInvoker::invoke`].
pub type InvokeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<InvocationOutput, ProcessError>> + Send + 'a>>;

/// Behaviour required to run one engine command to completion.
///
/// This abstraction keeps the harness testable without an engine binary.
pub trait EngineInvoker {
    /// Run `invocation`, honouring cancellation signalled through `ctx`.
    fn invoke(&self, ctx: &CallContext, invocation: Invocation) -> InvokeFuture<'_>;
}

/// A fully resolved engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    working_dir: Utf8PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl Invocation {
    /// Create an invocation of `program` inside `working_dir`.
    #[must_use]
    pub fn new(program: impl Into<String>, working_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add environment variables on top of the inherited environment.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Directory the process runs in.
    #[must_use]
    pub const fn working_dir(&self) -> &Utf8PathBuf {
        &self.working_dir
    }

    /// Argument vector, excluding the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }
}

/// Captured result of a finished engine process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl InvocationOutput {
    /// Create an output record.
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    #[must_use]
    pub const fn new(exit_code: Option<i32>, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Exit code, or `None` if the process was terminated by a signal.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Raw standard output.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Raw standard error.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Standard error decoded lossily as UTF-8.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Standard output decoded lossily as UTF-8.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs the engine as a child process of the current process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessInvoker {
    interrupt_grace: Duration,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self {
            interrupt_grace: DEFAULT_INTERRUPT_GRACE,
        }
    }
}

impl ProcessInvoker {
    /// Set how long a canceled engine may take to exit after the interrupt.
    #[must_use]
    pub const fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace = grace;
        self
    }

    /// The grace period between interrupt and kill.
    #[must_use]
    pub const fn interrupt_grace(&self) -> Duration {
        self.interrupt_grace
    }
}

impl EngineInvoker for ProcessInvoker {
    fn invoke(&self, ctx: &CallContext, invocation: Invocation) -> InvokeFuture<'_> {
        let call_ctx = ctx.clone();
        let grace = self.interrupt_grace;
        Box::pin(async move { run_invocation(&call_ctx, &invocation, grace).await })
    }
}

/// Spawn the engine, collect its output, and enforce cancellation.
///
/// A context that has already fired prevents the spawn entirely.
async fn run_invocation(
    ctx: &CallContext,
    invocation: &Invocation,
    grace: Duration,
) -> Result<InvocationOutput, ProcessError> {
    if let Some(cause) = ctx.cause() {
        debug!(
            target: ENGINE_TARGET,
            program = invocation.program(),
            %cause,
            "context already done, not spawning engine"
        );
        return Err(ProcessError::Canceled { cause });
    }

    let mut child = spawn(invocation)?;
    let stdout = child.stdout.take().ok_or_else(|| ProcessError::Io {
        program: invocation.program().to_owned(),
        message: String::from("stdout was not piped"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| ProcessError::Io {
        program: invocation.program().to_owned(),
        message: String::from("stderr was not piped"),
    })?;

    let outcome = tokio::select! {
        biased;
        cause = ctx.done() => Err(cause),
        collected = collect(&mut child, stdout, stderr) => Ok(collected),
    };

    match outcome {
        Ok(Ok((status, stdout_bytes, stderr_bytes))) => {
            debug!(
                target: ENGINE_TARGET,
                program = invocation.program(),
                exit_code = ?status.code(),
                stdout_bytes = stdout_bytes.len(),
                stderr_bytes = stderr_bytes.len(),
                "engine exited"
            );
            Ok(InvocationOutput::new(
                status.code(),
                stdout_bytes,
                stderr_bytes,
            ))
        }
        Ok(Err(error)) => {
            terminate(&mut child, invocation, grace).await;
            Err(ProcessError::Io {
                program: invocation.program().to_owned(),
                message: error.to_string(),
            })
        }
        Err(cause) => {
            warn!(
                target: ENGINE_TARGET,
                program = invocation.program(),
                %cause,
                "engine call canceled, interrupting process group"
            );
            terminate(&mut child, invocation, grace).await;
            Err(ProcessError::Canceled { cause })
        }
    }
}

fn spawn(invocation: &Invocation) -> Result<Child, ProcessError> {
    let mut command = Command::new(invocation.program());
    command
        .args(invocation.args())
        .current_dir(invocation.working_dir().as_std_path())
        .envs(invocation.env().iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    debug!(
        target: ENGINE_TARGET,
        program = invocation.program(),
        args = ?invocation.args(),
        working_dir = %invocation.working_dir(),
        "spawning engine"
    );

    command.spawn().map_err(|error| ProcessError::SpawnFailed {
        program: invocation.program().to_owned(),
        source: Arc::new(error),
    })
}

/// Drain both pipes while waiting so a chatty child cannot fill a pipe buffer.
async fn collect(
    child: &mut Child,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    let (status, _, _) = tokio::try_join!(
        child.wait(),
        stdout.read_to_end(&mut stdout_bytes),
        stderr.read_to_end(&mut stderr_bytes),
    )?;
    Ok((status, stdout_bytes, stderr_bytes))
}

/// Interrupt the engine's process group, wait up to `grace` for the engine
/// to exit, then kill every remaining group member and reap the child.
#[cfg(unix)]
async fn terminate(child: &mut Child, invocation: &Invocation, grace: Duration) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(group) = child
        .id()
        .and_then(|id| i32::try_from(id).ok())
        .map(Pid::from_raw)
    else {
        reap(child, invocation).await;
        return;
    };

    if let Err(error) = killpg(group, Signal::SIGINT) {
        debug!(
            target: ENGINE_TARGET,
            program = invocation.program(),
            %error,
            "engine process group gone before interrupt"
        );
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!(
            target: ENGINE_TARGET,
            program = invocation.program(),
            grace_secs = grace.as_secs(),
            "engine ignored interrupt, killing process group"
        );
    }
    // Background helpers outlive the leader unless the group is swept.
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(error) => warn!(
            target: ENGINE_TARGET,
            program = invocation.program(),
            %error,
            "failed to kill engine process group"
        ),
    }
    reap(child, invocation).await;
}

/// Kill the child and reap it so no process outlives the call.
#[cfg(not(unix))]
async fn terminate(child: &mut Child, invocation: &Invocation, _grace: Duration) {
    if let Err(error) = child.start_kill() {
        debug!(
            target: ENGINE_TARGET,
            program = invocation.program(),
            %error,
            "engine already exited before kill"
        );
    }
    reap(child, invocation).await;
}

async fn reap(child: &mut Child, invocation: &Invocation) {
    if let Err(error) = child.wait().await {
        warn!(
            target: ENGINE_TARGET,
            program = invocation.program(),
            %error,
            "failed to reap terminated engine"
        );
    }
}

#[cfg(test)]
mod tests;
