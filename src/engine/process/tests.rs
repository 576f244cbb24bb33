//! Unit tests for the engine process invoker.
//!
//! These tests drive `ProcessInvoker` against ordinary POSIX utilities so the
//! capture, exit code, and cancellation behaviour can be checked without an
//! engine binary.

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::rstest;
use tokio::time::Instant;

use super::{DEFAULT_INTERRUPT_GRACE, EngineInvoker, Invocation, InvocationOutput, ProcessInvoker};
use crate::engine::CallContext;
use crate::error::{CancelCause, ProcessError};

fn scratch() -> tempfile::TempDir {
    tempfile::tempdir().expect("temporary directory should be created")
}

fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temporary path should be UTF-8")
}

fn shell(dir: &tempfile::TempDir, script: &str) -> Invocation {
    Invocation::new("sh", utf8_dir(dir)).with_args(["-c", script])
}

#[rstest]
fn invocation_builder_accumulates_args_and_env() {
    let invocation = Invocation::new("terraform", "/srv/net")
        .with_args(["apply", "-auto-approve"])
        .with_args(["-var=a=b"])
        .with_env([("TF_IN_AUTOMATION", "1")]);

    assert_eq!(invocation.program(), "terraform");
    assert_eq!(invocation.working_dir(), &Utf8PathBuf::from("/srv/net"));
    assert_eq!(invocation.args(), ["apply", "-auto-approve", "-var=a=b"]);
    assert_eq!(
        invocation.env(),
        [(String::from("TF_IN_AUTOMATION"), String::from("1"))]
    );
}

#[rstest]
#[case(Some(0), true)]
#[case(Some(1), false)]
#[case(None, false)]
fn invocation_output_success_requires_zero_exit(
    #[case] exit_code: Option<i32>,
    #[case] expected: bool,
) {
    let output = InvocationOutput::new(exit_code, Vec::new(), Vec::new());
    assert_eq!(output.success(), expected);
}

#[tokio::test]
async fn captures_stdout_and_stderr_separately() {
    let dir = scratch();
    let invocation = shell(&dir, "printf out; printf err >&2; exit 3");

    let output = ProcessInvoker::default()
        .invoke(&CallContext::background(), invocation)
        .await
        .expect("process should run");

    assert_eq!(output.stdout(), b"out");
    assert_eq!(output.stderr(), b"err");
    assert_eq!(output.exit_code(), Some(3));
}

#[tokio::test]
async fn runs_in_the_requested_working_directory() {
    let dir = scratch();
    let expected = dir
        .path()
        .canonicalize()
        .expect("temporary path should canonicalize");

    let output = ProcessInvoker::default()
        .invoke(&CallContext::background(), shell(&dir, "pwd -P"))
        .await
        .expect("process should run");

    assert_eq!(
        output.stdout_lossy().trim_end(),
        expected.to_string_lossy()
    );
}

#[tokio::test]
async fn passes_extra_environment() {
    let dir = scratch();
    let invocation =
        shell(&dir, "printf %s \"$TFHARNESS_EXTRA\"").with_env([("TFHARNESS_EXTRA", "present")]);

    let output = ProcessInvoker::default()
        .invoke(&CallContext::background(), invocation)
        .await
        .expect("process should run");

    assert_eq!(output.stdout_lossy(), "present");
}

#[tokio::test]
async fn stdin_is_closed() {
    let dir = scratch();
    let output = ProcessInvoker::default()
        .invoke(&CallContext::background(), shell(&dir, "cat; echo done"))
        .await
        .expect("process should run");

    assert_eq!(output.stdout_lossy(), "done\n");
}

#[tokio::test]
async fn missing_binary_is_a_spawn_failure() {
    let dir = scratch();
    let invocation = Invocation::new("tfharness-no-such-engine", utf8_dir(&dir));

    let error = ProcessInvoker::default()
        .invoke(&CallContext::background(), invocation)
        .await
        .expect_err("spawn should fail");

    assert!(
        matches!(error, ProcessError::SpawnFailed { ref program, .. } if program == "tfharness-no-such-engine"),
        "unexpected error: {error}"
    );
}

#[tokio::test]
async fn expired_deadline_never_spawns() {
    let dir = scratch();
    let marker = dir.path().join("spawned");
    let ctx = CallContext::background().with_deadline(Instant::now());
    let invocation = shell(&dir, "touch spawned");

    let error = ProcessInvoker::default()
        .invoke(&ctx, invocation)
        .await
        .expect_err("call should be refused");

    assert!(matches!(
        error,
        ProcessError::Canceled {
            cause: CancelCause::DeadlineExceeded
        }
    ));
    assert!(!marker.exists(), "engine must not be spawned");
}

#[tokio::test]
async fn cancellation_terminates_running_process() {
    let dir = scratch();
    let ctx = CallContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let error = ProcessInvoker::default()
        .invoke(&ctx, shell(&dir, "sleep 30"))
        .await
        .expect_err("call should be canceled");

    assert!(matches!(
        error,
        ProcessError::Canceled {
            cause: CancelCause::Canceled
        }
    ));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn timeout_reports_deadline_exceeded() {
    let dir = scratch();
    let ctx = CallContext::background().with_timeout(Duration::from_millis(200));

    let error = ProcessInvoker::default()
        .invoke(&ctx, shell(&dir, "sleep 30"))
        .await
        .expect_err("call should time out");

    assert!(matches!(
        error,
        ProcessError::Canceled {
            cause: CancelCause::DeadlineExceeded
        }
    ));
}

fn cancel_after(ctx: &CallContext, delay: Duration) {
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        canceller.cancel();
    });
}

/// A process counts as gone once it no longer exists or is an unreaped zombie.
#[cfg(unix)]
fn process_is_gone(pid: i32) -> bool {
    if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_err() {
        return true;
    }
    std::fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
        stat.rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z'))
    })
}

#[cfg(unix)]
async fn wait_until_gone(pid: i32) -> bool {
    for _ in 0..100 {
        if process_is_gone(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[rstest]
fn default_grace_period_is_used() {
    assert_eq!(
        ProcessInvoker::default().interrupt_grace(),
        DEFAULT_INTERRUPT_GRACE
    );
    assert_eq!(
        ProcessInvoker::default()
            .with_interrupt_grace(Duration::from_secs(1))
            .interrupt_grace(),
        Duration::from_secs(1)
    );
}

#[cfg(unix)]
#[tokio::test]
async fn cancellation_interrupts_the_engine_before_killing_it() {
    let dir = scratch();
    let ctx = CallContext::background();
    cancel_after(&ctx, Duration::from_millis(200));

    let error = ProcessInvoker::default()
        .invoke(
            &ctx,
            shell(&dir, "trap 'touch interrupted; exit 130' INT; sleep 30 & wait"),
        )
        .await
        .expect_err("call should be canceled");

    assert!(matches!(error, ProcessError::Canceled { .. }));
    assert!(
        dir.path().join("interrupted").exists(),
        "engine should get to run its interrupt handler"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn cancellation_kills_background_children_of_the_engine() {
    let dir = scratch();
    let ctx = CallContext::background();
    cancel_after(&ctx, Duration::from_millis(300));

    let error = ProcessInvoker::default()
        .invoke(&ctx, shell(&dir, "sleep 30 & echo $! > child.pid; wait"))
        .await
        .expect_err("call should be canceled");

    assert!(matches!(error, ProcessError::Canceled { .. }));
    let pid: i32 = std::fs::read_to_string(dir.path().join("child.pid"))
        .expect("child pid should be recorded")
        .trim()
        .parse()
        .expect("child pid should be numeric");
    assert!(
        wait_until_gone(pid).await,
        "background child {pid} should not outlive the call"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn engine_ignoring_interrupt_is_killed_after_grace() {
    let dir = scratch();
    let ctx = CallContext::background();
    cancel_after(&ctx, Duration::from_millis(200));
    let started = std::time::Instant::now();

    let error = ProcessInvoker::default()
        .with_interrupt_grace(Duration::from_millis(300))
        .invoke(&ctx, shell(&dir, "trap '' INT; sleep 30"))
        .await
        .expect_err("call should be canceled");

    assert!(matches!(error, ProcessError::Canceled { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}
