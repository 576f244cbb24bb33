//! Semantic error types for the harness.
//!
//! This module defines the error hierarchy for `tfharness`, following the
//! principle of using semantic error enums (via `thiserror`) for conditions the
//! caller might inspect, retry, or branch on, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.
//!
//! Engine failures are surfaced as [`ClassifiedError`], which pairs a semantic
//! [`ErrorKind`] with the engine's own diagnostic text. The raw text is always
//! kept so that classification only ever adds structure.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Lifecycle operations the harness drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `validate`: read-only configuration check.
    Validate,
    /// `workspace select` / `workspace new`.
    Workspace,
    /// `init`, optionally copying a module source first.
    Init,
    /// `apply -auto-approve`.
    Apply,
    /// `destroy -auto-approve`.
    Destroy,
    /// `output -json`.
    Output,
}

impl Operation {
    /// Human-readable description used in error messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Validate => "validate configuration",
            Self::Workspace => "select workspace",
            Self::Init => "initialize configuration",
            Self::Apply => "apply configuration",
            Self::Destroy => "destroy configuration",
            Self::Output => "read outputs",
        }
    }

    /// The engine subcommand that implements this operation.
    #[must_use]
    pub const fn subcommand(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Workspace => "workspace",
            Self::Init => "init",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

/// Why an in-flight call stopped before the engine finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelCause {
    /// The caller's cancellation token fired.
    Canceled,
    /// The call's deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => f.write_str("call canceled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Semantic error kinds an orchestrator can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Validation found structural errors in the module.
    InvalidConfiguration {
        /// Number of errors the engine reported.
        error_count: u64,
    },
    /// Init's module source could not be resolved.
    ModuleNotFound,
    /// The working directory holds no configuration.
    NoConfigurationFiles,
    /// A supplied variable is not declared by the module.
    UndeclaredVariable,
    /// Any other non-zero exit.
    OperationFailed,
    /// The call was stopped by caller cancellation or timeout.
    Canceled,
    /// Machine-readable engine output did not match the expected shape.
    DecodeFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration { .. } => f.write_str("invalid configuration"),
            Self::ModuleNotFound => f.write_str("module not found"),
            Self::NoConfigurationFiles => f.write_str("no configuration files"),
            Self::UndeclaredVariable => f.write_str("undeclared variable"),
            Self::OperationFailed => f.write_str("operation failed"),
            Self::Canceled => f.write_str("canceled"),
            Self::DecodeFailure => f.write_str("decode failure"),
        }
    }
}

/// An engine failure with a semantic kind layered over the raw diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {}: {summary}", operation.description())]
pub struct ClassifiedError {
    operation: Operation,
    kind: ErrorKind,
    summary: String,
    message: String,
}

impl ClassifiedError {
    /// Create a classified error.
    ///
    /// `summary` is a short description; `message` carries the engine's
    /// diagnostic text verbatim.
    #[must_use]
    pub fn new(
        operation: Operation,
        kind: ErrorKind,
        summary: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            summary: summary.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error for `operation`.
    #[must_use]
    pub fn canceled(operation: Operation, cause: CancelCause) -> Self {
        Self::new(operation, ErrorKind::Canceled, cause.to_string(), String::new())
    }

    /// Put diagnostics from an earlier step of the same operation ahead of
    /// this error's message. Blank diagnostics are ignored.
    #[must_use]
    pub fn with_earlier_diagnostic(mut self, earlier: &str) -> Self {
        if earlier.trim().is_empty() {
            return self;
        }
        let mut message = earlier.to_owned();
        if !message.ends_with('\n') {
            message.push('\n');
        }
        message.push_str(&self.message);
        self.message = message;
        self
    }

    /// The operation that failed.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// The semantic kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Short description of the failure.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The engine's diagnostic text, unmodified.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Local failures starting, supervising, or reaping the engine process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The engine binary could not be started.
    #[error("failed to start engine '{program}': {source}")]
    SpawnFailed {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// Reading engine output or waiting for exit failed.
    #[error("failed to supervise engine '{program}': {message}")]
    Io {
        /// Program that was invoked.
        program: String,
        /// A description of the failure.
        message: String,
    },

    /// The call was canceled before the engine finished.
    #[error("engine call stopped: {cause}")]
    Canceled {
        /// Why the call stopped.
        cause: CancelCause,
    },
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

/// Top-level error type for harness operations.
///
/// At the application boundary (main.rs) these errors are converted to
/// `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine reported a failure.
    #[error(transparent)]
    Engine(#[from] ClassifiedError),

    /// The engine process could not be run.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// An error occurred during filesystem operations.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl HarnessError {
    /// The semantic kind, when the error came from the engine.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Engine(classified) => Some(classified.kind()),
            Self::Config(_) | Self::Process(_) | Self::Filesystem(_) => None,
        }
    }

    /// The classified engine error, if any.
    #[must_use]
    pub const fn as_classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Engine(classified) => Some(classified),
            Self::Config(_) | Self::Process(_) | Self::Filesystem(_) => None,
        }
    }
}

/// A specialised `Result` type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
