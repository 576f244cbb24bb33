//! Shared fixtures and helper functions for config tests.

use crate::config::AppConfig;
use ortho_config::MergeComposer;
use rstest::fixture;
use std::sync::Arc;

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        binary_path = "/usr/local/bin/terraform"
        working_dir = "/srv/provision/network"
        timeout_secs = 1800

        [engine]
        in_automation = false

        [engine.env]
        TF_LOG = "WARN"
        TF_PLUGIN_CACHE_DIR = "/var/cache/terraform"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing an `AppConfig` parsed from a minimal TOML example.
#[fixture]
pub fn app_config_from_partial_toml() -> AppConfig {
    let toml = r#"
        working_dir = "/srv/provision/network"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Helper: Creates a `MergeComposer` with defaults layer already pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Helper: Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Helper: Asserts that a config has all default values.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(config.binary_path.is_none(), "binary_path should be None");
    assert!(config.working_dir.is_none(), "working_dir should be None");
    assert!(config.timeout_secs.is_none(), "timeout_secs should be None");
    assert!(
        config.engine.in_automation,
        "engine.in_automation should be true"
    );
    assert!(config.engine.env.is_empty(), "engine.env should be empty");
}

/// Helper: Creates a `MergeComposer` with defaults, file, and env layers for testing layer precedence.
pub fn create_composer_with_file_and_env() -> Result<MergeComposer, serde_json::Error> {
    use ortho_config::serde_json::json;

    let mut composer = create_composer_with_defaults()?;

    composer.push_file(
        json!({
            "binary_path": "/from/file/terraform",
            "working_dir": "/from/file/module"
        }),
        None,
    );

    composer.push_environment(json!({
        "binary_path": "/from/env/terraform"
    }));

    Ok(composer)
}
