//! Configuration data types for tfharness.

use std::collections::BTreeMap;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Settings passed through to every engine process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct EngineConfig {
    /// Set `TF_IN_AUTOMATION=1` so the engine suppresses interactive hints.
    #[default(true)]
    pub in_automation: bool,

    /// Extra environment variables for the engine, such as `TF_LOG`.
    pub env: BTreeMap<String, String>,
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `TFHARNESS_CONFIG_PATH` environment variable
/// 2. `.tfharness.toml` in the current working directory
/// 3. `.tfharness.toml` in the home directory
/// 4. `~/.config/tfharness/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "TFHARNESS",
    post_merge_hook,
    discovery(
        app_name = "tfharness",
        env_var = "TFHARNESS_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".tfharness.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The engine binary. Falls back to `TF_BINARY`, then `terraform`.
    pub binary_path: Option<String>,

    /// The working directory holding the module configuration.
    #[ortho_config(skip_cli)]
    pub working_dir: Option<Utf8PathBuf>,

    /// Per-call deadline in seconds for command-line invocations.
    pub timeout_secs: Option<u64>,

    /// Engine process settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// The per-call timeout. Zero means no timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Treat blank strings and a zero timeout as unset.
    pub fn normalize(&mut self) {
        if self.binary_path.as_deref().is_some_and(str::is_empty) {
            self.binary_path = None;
        }
        if self
            .working_dir
            .as_ref()
            .is_some_and(|dir| dir.as_str().is_empty())
        {
            self.working_dir = None;
        }
        if self.timeout_secs == Some(0) {
            self.timeout_secs = None;
        }
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        self.normalize();
        Ok(())
    }
}
