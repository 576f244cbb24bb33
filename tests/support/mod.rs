//! Shared fixtures for tests that drive the offline stand-in engine.
//!
//! The stand-in is a POSIX shell script that mimics the engine's command-line
//! surface and diagnostics. It is written once per test binary to a private
//! path under `CARGO_TARGET_TMPDIR` with execute permission.

#![expect(clippy::expect_used, reason = "fixture set-up failures should abort the test")]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::OnceLock;

use camino::{Utf8Path, Utf8PathBuf};
use tfharness::engine::Harness;

const FAKE_ENGINE: &str = include_str!("fake_engine.sh");

/// State file the stand-in engine reads outputs from.
pub const FAKE_OUTPUTS_FILE: &str = "fake-outputs.json";

static ENGINE_PATH: OnceLock<Utf8PathBuf> = OnceLock::new();

/// Path to the stand-in engine for this test binary.
pub fn fake_engine() -> &'static Utf8Path {
    ENGINE_PATH.get_or_init(|| {
        let path = Utf8PathBuf::from(env!("CARGO_TARGET_TMPDIR"))
            .join(format!("fake-engine-{}.sh", std::process::id()));
        fs::write(&path, FAKE_ENGINE).expect("stand-in engine should be written");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("stand-in engine should be made executable");
        path
    })
}

/// A module under `tests/testdata`.
pub fn testdata(module: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(module)
}

/// A scratch working directory removed on drop.
#[derive(Debug)]
pub struct WorkDir {
    _guard: tempfile::TempDir,
    path: Utf8PathBuf,
}

/// Create an empty working directory.
pub fn work_dir() -> WorkDir {
    let guard = tempfile::Builder::new()
        .prefix("tfharness-test")
        .tempdir()
        .expect("temporary working directory should be created");
    let path = Utf8PathBuf::from_path_buf(guard.path().to_path_buf())
        .expect("temporary path should be UTF-8");
    WorkDir {
        _guard: guard,
        path,
    }
}

impl WorkDir {
    /// The directory path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Seed the stand-in engine's state with an `output -json` document.
    pub fn seed_outputs(&self, document: &str) {
        fs::write(self.path.join(FAKE_OUTPUTS_FILE), document)
            .expect("output state should be written");
    }

    /// Names of staged variable files left behind in the directory.
    pub fn leftover_staged_files(&self) -> Vec<String> {
        fs::read_dir(&self.path)
            .expect("working directory should be readable")
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(tfharness::engine::STAGED_PREFIX))
            .collect()
    }
}

/// Whether `pid` has exited. An unreaped zombie counts as exited.
pub fn process_is_gone(pid: i32) -> bool {
    if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_err() {
        return true;
    }
    fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
        stat.rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z'))
    })
}

/// Read a pid the stand-in engine recorded in `path`.
pub fn recorded_pid(path: &Utf8Path) -> i32 {
    fs::read_to_string(path)
        .expect("pid file should be written")
        .trim()
        .parse()
        .expect("pid file should hold a number")
}

/// A harness running the stand-in engine in `dir`.
pub fn fake_harness(dir: &Utf8Path) -> Harness {
    Harness::new(fake_engine().as_str(), dir).expect("harness should build")
}
