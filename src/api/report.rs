//! JSON rendering of module outputs for the command line.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::{Output, OutputType, OutputValue};

/// Placeholder printed in place of a sensitive value.
pub const REDACTED: &str = "(sensitive value)";

/// Outputs keyed by name, shaped like the engine's own `output -json`.
///
/// Sensitive values are replaced by [`REDACTED`] unless the report was built
/// with `show_sensitive`.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct OutputsReport<'a> {
    entries: BTreeMap<&'a str, ReportEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    sensitive: bool,
    #[serde(rename = "type")]
    output_type: OutputType,
    value: ReportValue<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReportValue<'a> {
    Shown(&'a OutputValue),
    Redacted(&'static str),
}

impl<'a> OutputsReport<'a> {
    /// Build a report over `outputs`.
    #[must_use]
    pub fn new(outputs: &'a [Output], show_sensitive: bool) -> Self {
        let entries = outputs
            .iter()
            .map(|output| {
                let value = if output.sensitive() && !show_sensitive {
                    ReportValue::Redacted(REDACTED)
                } else {
                    ReportValue::Shown(output.value())
                };
                (output.name(), ReportEntry {
                    sensitive: output.sensitive(),
                    output_type: output.output_type(),
                    value,
                })
            })
            .collect();
        Self { entries }
    }

    /// Number of outputs in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the module declared no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
