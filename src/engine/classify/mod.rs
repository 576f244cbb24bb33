//! Mapping of engine failures onto semantic error kinds.
//!
//! Recognized diagnostics live in a single table, [`DIAGNOSTIC_SIGNATURES`].
//! Matching happens against the first `Error:` summary line of stderr after
//! terminal decoration has been removed, so the rest of the diagnostic text
//! never influences the kind. The full stderr is always carried verbatim.

use serde::Deserialize;

use super::process::InvocationOutput;
use crate::error::{ClassifiedError, ErrorKind, Operation};

/// Recognized diagnostic summaries and the kind each maps to.
///
/// Patterns are lower-case and matched as substrings of the lower-cased
/// summary line. The first match wins; anything unmatched is
/// [`ErrorKind::OperationFailed`].
pub const DIAGNOSTIC_SIGNATURES: &[(&str, ErrorKind)] = &[
    ("module not found", ErrorKind::ModuleNotFound),
    ("failed to read module directory", ErrorKind::ModuleNotFound),
    ("no configuration files", ErrorKind::NoConfigurationFiles),
    ("value for undeclared variable", ErrorKind::UndeclaredVariable),
];

/// Classify the result of a finished engine process.
///
/// A zero exit is success whatever stderr contains.
///
/// # Errors
///
/// Returns a [`ClassifiedError`] for any non-zero exit or signal termination.
pub fn classify(operation: Operation, output: &InvocationOutput) -> Result<(), ClassifiedError> {
    if output.success() {
        return Ok(());
    }
    Err(classify_stderr(operation, output))
}

/// Classify the result of `validate -json`.
///
/// The engine's report is authoritative when stdout parses as one, regardless
/// of exit code. Otherwise a failing exit falls back to stderr classification
/// and a zero exit with unreadable stdout is a decode failure.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidConfiguration`] carrying the reported error
/// count when the module is invalid.
pub fn classify_validation(output: &InvocationOutput) -> Result<(), ClassifiedError> {
    match serde_json::from_slice::<ValidationReport>(output.stdout()) {
        Ok(report) if report.valid => Ok(()),
        Ok(report) => Err(report.into_error(output)),
        Err(_) if !output.success() => Err(classify_stderr(Operation::Validate, output)),
        Err(error) => Err(ClassifiedError::new(
            Operation::Validate,
            ErrorKind::DecodeFailure,
            "unexpected validation report format",
            format!("{error}\n{}", output.stdout_lossy()),
        )),
    }
}

/// Find the kind for a diagnostic summary line.
#[must_use]
pub fn kind_for_summary(summary: &str) -> ErrorKind {
    let lowered = summary.to_lowercase();
    DIAGNOSTIC_SIGNATURES
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map_or(ErrorKind::OperationFailed, |(_, kind)| *kind)
}

/// Extract the first `Error: ...` summary from engine stderr.
///
/// ANSI escape sequences and the box-drawing gutter the engine draws around
/// diagnostics are ignored.
#[must_use]
pub fn error_summary(stderr: &str) -> Option<String> {
    stderr.lines().find_map(|line| {
        let cleaned = strip_ansi(line);
        let trimmed = cleaned
            .trim_start_matches(|c: char| c.is_whitespace() || is_gutter(c))
            .trim_end();
        trimmed
            .strip_prefix("Error:")
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
            .map(ToOwned::to_owned)
    })
}

fn classify_stderr(operation: Operation, output: &InvocationOutput) -> ClassifiedError {
    let stderr = output.stderr_lossy();
    let Some(exit_code) = output.exit_code() else {
        return ClassifiedError::new(
            operation,
            ErrorKind::OperationFailed,
            "engine terminated by signal",
            stderr,
        );
    };

    match error_summary(&stderr) {
        Some(summary) => {
            let kind = kind_for_summary(&summary);
            ClassifiedError::new(operation, kind, summary.to_lowercase(), stderr)
        }
        None => ClassifiedError::new(
            operation,
            ErrorKind::OperationFailed,
            format!("engine exited with status {exit_code}"),
            stderr,
        ),
    }
}

const fn is_gutter(c: char) -> bool {
    matches!(c, '│' | '╷' | '╵' | '|')
}

/// Remove CSI escape sequences such as colour codes.
fn strip_ansi(line: &str) -> String {
    let mut cleaned = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            cleaned.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for terminator in chars.by_ref() {
                if ('@'..='~').contains(&terminator) {
                    break;
                }
            }
        }
    }
    cleaned
}

/// The fields of the `validate -json` report the harness acts on.
#[derive(Debug, Deserialize)]
struct ValidationReport {
    valid: bool,
    #[serde(default)]
    error_count: u64,
}

impl ValidationReport {
    /// The message is the report itself, followed by stderr when present.
    fn into_error(self, output: &InvocationOutput) -> ClassifiedError {
        let summary = match self.error_count {
            1 => String::from("found 1 configuration error"),
            count => format!("found {count} configuration errors"),
        };
        let mut message = output.stdout_lossy();
        let stderr = output.stderr_lossy();
        if !stderr.trim().is_empty() {
            if !message.ends_with('\n') {
                message.push('\n');
            }
            message.push_str(&stderr);
        }
        ClassifiedError::new(
            Operation::Validate,
            ErrorKind::InvalidConfiguration {
                error_count: self.error_count,
            },
            summary,
            message,
        )
    }
}
