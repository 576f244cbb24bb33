//! Variable file staging.
//!
//! Variable file content supplied by the caller is written to uniquely named
//! scratch files inside the working directory for the lifetime of a single
//! engine call. The file extension tags the format so the engine parses HCL
//! and JSON content correctly, and the `.tfharness-` prefix keeps the names
//! clear of the engine's auto-loaded `terraform.tfvars` and `*.auto.tfvars`
//! patterns.

use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs::OpenOptions;
use cap_std::fs_utf8::Dir;
use tracing::warn;

use super::process::ENGINE_TARGET;
use crate::error::FilesystemError;

/// Prefix shared by every staged variable file.
pub const STAGED_PREFIX: &str = ".tfharness-";

/// Upper bound on name collisions tolerated before giving up.
const MAX_NAME_ATTEMPTS: u32 = 64;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Serialization format of variable file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarFileFormat {
    /// Native configuration syntax (`name = "value"`).
    Hcl,
    /// JSON object syntax (`{"name": "value"}`).
    Json,
}

impl VarFileFormat {
    /// File extension the engine associates with this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Hcl => "tfvars",
            Self::Json => "tfvars.json",
        }
    }

    /// Infer the format from a file path: `.json` is JSON, anything else HCL.
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some(extension) if extension.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Hcl,
        }
    }
}

/// Raw variable file content tagged with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarFile {
    content: Vec<u8>,
    format: VarFileFormat,
}

impl VarFile {
    /// Wrap `content` in the given format.
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>, format: VarFileFormat) -> Self {
        Self {
            content: content.into(),
            format,
        }
    }

    /// The raw bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// The declared format.
    #[must_use]
    pub const fn format(&self) -> VarFileFormat {
        self.format
    }
}

/// Variable files written into a working directory for one engine call.
///
/// Every staged file is removed when this value is dropped, including when
/// the call fails or is canceled.
#[derive(Debug, Default)]
pub struct StagedVarFiles {
    dir: Option<Dir>,
    names: Vec<String>,
}

impl StagedVarFiles {
    /// Write each of `files` into `working_dir`.
    ///
    /// Files are created exclusively, so an existing file is never
    /// overwritten. Nothing is opened when `files` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`FilesystemError`] when the directory cannot be opened or a
    /// file cannot be written. Files staged before the failure are removed.
    pub fn stage(working_dir: &Utf8Path, files: &[VarFile]) -> Result<Self, FilesystemError> {
        if files.is_empty() {
            return Ok(Self::default());
        }

        let dir = Dir::open_ambient_dir(working_dir, ambient_authority()).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                FilesystemError::NotFound {
                    path: working_dir.as_std_path().to_path_buf(),
                }
            } else {
                FilesystemError::IoError {
                    path: working_dir.as_std_path().to_path_buf(),
                    message: format!("failed to open working directory: {error}"),
                }
            }
        })?;

        let mut names = Vec::with_capacity(files.len());
        for file in files {
            match write_unique(&dir, file) {
                Ok(name) => names.push(name),
                Err(error) => {
                    drop(Self {
                        dir: Some(dir),
                        names,
                    });
                    return Err(FilesystemError::IoError {
                        path: working_dir.as_std_path().to_path_buf(),
                        message: format!("failed to stage variable file: {error}"),
                    });
                }
            }
        }
        Ok(Self {
            dir: Some(dir),
            names,
        })
    }

    /// File names relative to the working directory, in staging order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Drop for StagedVarFiles {
    fn drop(&mut self) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        for name in &self.names {
            if let Err(error) = dir.remove_file(name) {
                warn!(
                    target: ENGINE_TARGET,
                    file = %name,
                    %error,
                    "failed to remove staged variable file"
                );
            }
        }
    }
}

fn write_unique(dir: &Dir, file: &VarFile) -> io::Result<String> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = next_name(file.format());
        match dir.open_with(&name, &options) {
            Ok(mut handle) => {
                if let Err(error) = handle.write_all(file.content()).and_then(|()| handle.flush())
                {
                    drop(handle);
                    if dir.remove_file(&name).is_err() {
                        warn!(
                            target: ENGINE_TARGET,
                            file = %name,
                            "failed to remove partial variable file"
                        );
                    }
                    return Err(error);
                }
                return Ok(name);
            }
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free variable file name",
    ))
}

fn next_name(format: VarFileFormat) -> String {
    let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{STAGED_PREFIX}{}-{sequence}.{}",
        process::id(),
        format.extension()
    )
}
