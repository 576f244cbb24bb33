//! Apply and destroy modifiers.
//!
//! Callers pass a slice of [`HarnessOption`] values; the harness folds them
//! left to right over an empty [`ResolvedOptions`] before each call, so no
//! option state outlives the call it was supplied to.

use std::collections::BTreeMap;

use smart_default::SmartDefault;

use super::varfile::{VarFile, VarFileFormat};

/// A single modifier for an apply or destroy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessOption {
    /// Set one input variable. Later values for the same name win.
    Var {
        /// Variable name.
        name: String,
        /// Variable value, passed to the engine as a string.
        value: String,
    },
    /// Supply a variable file, staged into the working directory per call.
    VarFile(VarFile),
    /// Restrict the operation to one resource address.
    Target(String),
    /// Enable or disable the state refresh that precedes planning.
    Refresh(bool),
}

/// Set the input variable `name` to `value`.
#[must_use]
pub fn with_var(name: impl Into<String>, value: impl Into<String>) -> HarnessOption {
    HarnessOption::Var {
        name: name.into(),
        value: value.into(),
    }
}

/// Supply raw variable file content in the given format.
#[must_use]
pub fn with_var_file(content: impl Into<Vec<u8>>, format: VarFileFormat) -> HarnessOption {
    HarnessOption::VarFile(VarFile::new(content, format))
}

/// Limit the operation to `address` and its dependencies.
#[must_use]
pub fn with_target(address: impl Into<String>) -> HarnessOption {
    HarnessOption::Target(address.into())
}

/// Control whether the engine refreshes state before planning.
#[must_use]
pub const fn with_refresh(refresh: bool) -> HarnessOption {
    HarnessOption::Refresh(refresh)
}

/// The finalized argument set produced by folding a slice of options.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct ResolvedOptions {
    vars: BTreeMap<String, String>,
    var_files: Vec<VarFile>,
    targets: Vec<String>,
    #[default(true)]
    refresh: bool,
}

impl ResolvedOptions {
    /// Fold `options` left to right over an empty context.
    #[must_use]
    pub fn resolve(options: &[HarnessOption]) -> Self {
        options.iter().fold(Self::default(), Self::apply)
    }

    fn apply(mut self, option: &HarnessOption) -> Self {
        match option {
            HarnessOption::Var { name, value } => {
                self.vars.insert(name.clone(), value.clone());
            }
            HarnessOption::VarFile(file) => self.var_files.push(file.clone()),
            HarnessOption::Target(address) => self.targets.push(address.clone()),
            HarnessOption::Refresh(refresh) => self.refresh = *refresh,
        }
        self
    }

    /// Variables by name.
    #[must_use]
    pub const fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Variable files in application order.
    #[must_use]
    pub fn var_files(&self) -> &[VarFile] {
        &self.var_files
    }

    /// Resource targets in application order.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Whether state is refreshed before planning.
    #[must_use]
    pub const fn refresh(&self) -> bool {
        self.refresh
    }

    /// Render engine arguments given the staged names of the variable files.
    ///
    /// Variable files come first so that explicitly set variables override
    /// values loaded from files.
    #[must_use]
    pub fn arguments(&self, staged_var_files: &[String]) -> Vec<String> {
        let mut arguments: Vec<String> = staged_var_files
            .iter()
            .map(|name| format!("-var-file={name}"))
            .collect();
        arguments.extend(
            self.vars
                .iter()
                .map(|(name, value)| format!("-var={name}={value}")),
        );
        arguments.extend(self.targets.iter().map(|target| format!("-target={target}")));
        if !self.refresh {
            arguments.push(String::from("-refresh=false"));
        }
        arguments
    }
}
