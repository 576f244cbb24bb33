//! Configuration loading with layered precedence.
//!
//! This module provides functions to load configuration with the precedence order
//! (lowest to highest): application defaults, configuration file, environment
//! variables, command-line arguments.
//!
//! # Architecture Note: Why Manual Layer Composition?
//!
//! The `OrthoConfig` derive macro provides `load()` and `compose_layers()` methods
//! that handle discovery, environment variables, and CLI parsing automatically.
//! However, this loader uses `MergeComposer` manually because:
//!
//! 1. **Subcommand separation**: The CLI (`Cli` struct) handles subcommand dispatch
//!    via clap's `#[command(subcommand)]`, while `AppConfig` holds configuration
//!    values. `OrthoConfig`'s `load()` expects to own the entire CLI parsing.
//!
//! 2. **Environment variable validation**: `OrthoConfig`'s environment layer uses
//!    Figment, which silently ignores unparseable values. This loader returns
//!    errors for invalid typed values instead.
//!
//! 3. **Custom discovery integration**: The `Cli` struct already accepts `--config`
//!    via clap, so discovery must honour that path before falling back to XDG paths.
//!
//! # Environment Variable Handling
//!
//! Environment variables with unparseable values (e.g., `TFHARNESS_TIMEOUT_SECS=soon`
//! instead of a number) return an error immediately rather than silently falling
//! back to defaults.
//!
//! String fields (e.g., `TFHARNESS_BINARY_PATH`) are always accepted. Typed fields
//! like booleans (`TFHARNESS_ENGINE_IN_AUTOMATION`) or integers
//! (`TFHARNESS_TIMEOUT_SECS`) must have valid values or loading fails.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, FilesystemError, Result};

// ============================================================================
// Environment Variable Specification Table
// ============================================================================

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Boolean value (`true`/`false`). Invalid values return an error.
    Bool,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name (e.g., `TFHARNESS_BINARY_PATH`).
    env_var: &'static str,
    /// The JSON path segments (e.g., `["engine", "in_automation"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

/// Table of all environment variables and their JSON paths.
///
/// Adding or modifying environment variable mappings is a single-line change here.
/// The order doesn't matter as the table is processed in a single pass.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    // Top-level fields
    EnvVarSpec {
        env_var: "TFHARNESS_BINARY_PATH",
        path: &["binary_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "TFHARNESS_WORKING_DIR",
        path: &["working_dir"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "TFHARNESS_TIMEOUT_SECS",
        path: &["timeout_secs"],
        var_type: EnvVarType::U64,
    },
    // Engine fields
    EnvVarSpec {
        env_var: "TFHARNESS_ENGINE_IN_AUTOMATION",
        path: &["engine", "in_automation"],
        var_type: EnvVarType::Bool,
    },
];

/// Returns the list of environment variable names recognised by the config loader.
///
/// This is primarily useful for tests that need to clear all `TFHARNESS_*` environment
/// variables to ensure isolation. Using this function instead of a hard-coded list
/// ensures the test stays in sync with the loader's actual environment variable
/// mappings.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a TOML configuration file through a capability handle on its parent
/// directory and push it onto the composer as the file layer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let Some(file_name) = path.file_name() else {
        return Err(ConfigError::InvalidValue {
            field: String::from("config"),
            reason: format!("'{path}' does not name a file"),
        }
        .into());
    };

    let content = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name))
        .map_err(|error| ConfigError::ParseError {
            message: format!("failed to read {path}: {error}"),
        })?;

    let value = toml::from_str::<Value>(&content).map_err(|error| ConfigError::ParseError {
        message: format!("failed to parse {path}: {error}"),
    })?;

    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Locate the configuration file.
///
/// An explicit `--config` path must exist; otherwise `TFHARNESS_CONFIG_PATH`
/// and the standard discovery locations are searched.
fn config_file_path(cli: &Cli) -> Result<Option<Utf8PathBuf>> {
    if let Some(explicit) = cli.config.as_ref() {
        if explicit.exists() {
            return Ok(Some(explicit.clone()));
        }
        return Err(FilesystemError::NotFound {
            path: explicit.as_std_path().to_path_buf(),
        }
        .into());
    }

    let discovery = ConfigDiscovery::builder("tfharness")
        .env_var("TFHARNESS_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".tfharness.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|candidate| candidate.exists())
        .find_map(|candidate| Utf8PathBuf::try_from(candidate).ok()))
}

/// Load configuration with full layer precedence.
///
/// This function loads configuration from all available sources:
/// 1. Application defaults defined in the struct
/// 2. Configuration file (`--config`, `TFHARNESS_CONFIG_PATH`, or discovery)
/// 3. Environment variables prefixed with `TFHARNESS_`
/// 4. Command-line arguments (from the provided `Cli`)
///
/// Later sources override earlier ones.
///
/// # Errors
///
/// Returns an error if configuration loading fails due to:
/// - A missing `--config` file or a malformed configuration file
/// - Invalid typed environment variable values (e.g., non-numeric
///   `TFHARNESS_TIMEOUT_SECS`)
/// - Missing required fields after merge
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    // Layer 1: Defaults (serialised from AppConfig::default()).
    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    // Layer 2: Configuration file.
    if let Some(path) = config_file_path(cli)? {
        load_config_file(&path, &mut composer)?;
    }

    // Layer 3: Environment variables.
    let env_values = collect_env_vars()?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    // Layer 4: CLI overrides.
    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    // Merge all layers into the final configuration.
    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;

    Ok(config)
}

/// Collect environment variables with the `TFHARNESS_` prefix into a JSON value.
///
/// All mappings come from [`ENV_VAR_SPECS`].
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed environment variable (bool, u64)
/// has an unparseable value.
fn collect_env_vars() -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Ok(raw_value) = std::env::var(spec.env_var) else {
            continue;
        };
        let json_value = parse_env_value(spec, raw_value)?;
        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn parse_env_value(spec: &EnvVarSpec, raw_value: String) -> Result<Value> {
    let invalid = |expected: &str, raw: &str| ConfigError::InvalidValue {
        field: spec.env_var.to_owned(),
        reason: format!("expected {expected}, got '{raw}'"),
    };
    let value = match spec.var_type {
        EnvVarType::String => Value::String(raw_value),
        EnvVarType::Bool => raw_value
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| invalid("bool (true/false)", &raw_value))?,
        EnvVarType::U64 => raw_value
            .trim()
            .parse::<u64>()
            .map(|number| Value::Number(number.into()))
            .map_err(|_| invalid("unsigned integer", &raw_value))?,
    };
    Ok(value)
}

/// Insert a value at a nested path in a JSON map.
///
/// For a path like `["engine", "in_automation"]`, this creates the intermediate
/// `engine` object if needed and inserts `in_automation` within it.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    // Navigate to the parent object, creating intermediate objects as needed.
    let mut current = root;
    for &segment in parents {
        // Ensure the entry is an object; if it's not (shouldn't happen with our
        // controlled path specs), skip this insertion.
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    // Insert the final field.
    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref binary) = cli.binary {
        overrides.insert(String::from("binary_path"), Value::String(binary.clone()));
    }

    if let Some(ref dir) = cli.dir {
        overrides.insert(
            String::from("working_dir"),
            Value::String(dir.as_str().to_owned()),
        );
    }

    if let Some(timeout) = cli.timeout_secs {
        overrides.insert(String::from("timeout_secs"), Value::Number(timeout.into()));
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
