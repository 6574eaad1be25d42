// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::SwitchyardConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SwitchyardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.daemon.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "daemon.log_level `{}` must be one of: {}",
            config.daemon.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.registry.config_plugin.trim().is_empty() {
        errors.push(ConfigError::validation(
            "registry.config_plugin must not be empty",
        ));
    }

    // Multiplexed loggers: every listed name must be non-empty.
    if config
        .registry
        .logger_plugin
        .split(',')
        .any(|name| name.trim().is_empty())
    {
        errors.push(ConfigError::validation(format!(
            "registry.logger_plugin `{}` contains an empty logger name",
            config.registry.logger_plugin
        )));
    }

    for entry in &config.registry.disabled {
        let well_formed = entry
            .split_once('.')
            .is_some_and(|(kind, item)| !kind.trim().is_empty() && !item.trim().is_empty());
        if !well_formed {
            errors.push(ConfigError::validation(format!(
                "registry.disabled entry `{entry}` must have the form `kind.item`"
            )));
        }
    }

    if config.config.path.trim().is_empty() {
        errors.push(ConfigError::validation("config.path must not be empty"));
    }

    if config.logger.path.trim().is_empty() {
        errors.push(ConfigError::validation("logger.path must not be empty"));
    }

    for (i, path) in config.modules.autoload.iter().enumerate() {
        if path.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "modules.autoload[{i}] must not be empty"
            )));
        }
    }

    if config.extensions.max_connections == 0 {
        errors.push(ConfigError::validation(
            "extensions.max_connections must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
