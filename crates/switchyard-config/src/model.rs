// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Switchyard.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Switchyard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchyardConfig {
    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Built-in plugin selection.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Filesystem config plugin settings.
    #[serde(default)]
    pub config: ConfigSourceConfig,

    /// File logger plugin settings.
    #[serde(default)]
    pub logger: LoggerConfig,

    /// Dynamically loaded modules.
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Extension connection limits.
    #[serde(default)]
    pub extensions: ExtensionsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which built-in plugins are registered and selected.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Active item of the `config` registry.
    #[serde(default = "default_config_plugin")]
    pub config_plugin: String,

    /// Logger item(s) results are sent to. A comma-separated list is
    /// called multiplexed.
    #[serde(default = "default_logger_plugin")]
    pub logger_plugin: String,

    /// `kind.item` entries that are never registered.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            config_plugin: default_config_plugin(),
            logger_plugin: default_logger_plugin(),
            disabled: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Whether `kind.item` is listed in `disabled`.
    pub fn is_disabled(&self, kind: &str, item: &str) -> bool {
        self.disabled
            .iter()
            .filter_map(|entry| entry.split_once('.'))
            .any(|(k, i)| k.trim() == kind && i.trim() == item)
    }
}

fn default_config_plugin() -> String {
    "filesystem".to_string()
}

fn default_logger_plugin() -> String {
    "tracing".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSourceConfig {
    /// JSON file read by the filesystem config plugin.
    #[serde(default = "default_config_path")]
    pub path: String,
}

impl Default for ConfigSourceConfig {
    fn default() -> Self {
        Self {
            path: default_config_path(),
        }
    }
}

fn default_config_path() -> String {
    "/etc/switchyard/sources.json".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// File the file logger appends results to.
    #[serde(default = "default_logger_path")]
    pub path: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            path: default_logger_path(),
        }
    }
}

fn default_logger_path() -> String {
    "/var/log/switchyard/results.log".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModulesConfig {
    /// Module files, or directories of modules, loaded at startup in order.
    #[serde(default)]
    pub autoload: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionsConfig {
    /// Maximum number of live extension connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = SwitchyardConfig::default();
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.registry.config_plugin, "filesystem");
        assert_eq!(config.registry.logger_plugin, "tracing");
        assert!(config.registry.disabled.is_empty());
        assert_eq!(config.config.path, "/etc/switchyard/sources.json");
        assert_eq!(config.logger.path, "/var/log/switchyard/results.log");
        assert!(config.modules.autoload.is_empty());
        assert_eq!(config.extensions.max_connections, 64);
    }

    #[test]
    fn disabled_entries_match_kind_and_item() {
        let registry = RegistryConfig {
            disabled: vec!["logger.file".to_string(), "malformed".to_string()],
            ..RegistryConfig::default()
        };
        assert!(registry.is_disabled("logger", "file"));
        assert!(!registry.is_disabled("logger", "tracing"));
        assert!(!registry.is_disabled("config", "file"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = toml::from_str::<SwitchyardConfig>("[registry]\nconfig_plugn = \"x\"\n");
        assert!(result.is_err());
    }
}
