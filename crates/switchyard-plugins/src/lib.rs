// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled-in registries and plugins.
//!
//! [`register_builtins`] creates the `config`, `config_parser`, and `logger`
//! registries and fills them with the plugins shipped in this crate, honoring
//! the `registry.disabled` list from configuration.

pub mod config;
pub mod logger;
pub mod parser;

use std::sync::Arc;

use switchyard_config::SwitchyardConfig;
use switchyard_core::payload::request;
use switchyard_core::{PluginRef, RegistryError, RegistryKind};
use switchyard_registry::{Registry, RegistryFactory};

pub use config::FilesystemConfigPlugin;
pub use logger::{FileLoggerPlugin, TracingLoggerPlugin};
pub use parser::KeyedParserPlugin;

/// Top-level config keys collected by the built-in `options` parser.
pub const OPTIONS_KEYS: &[&str] = &["options"];

/// Registers the built-in registries and plugins.
///
/// Fails with the fatal [`RegistryError::DuplicateRegistry`] if a built-in
/// kind already exists. An unknown `registry.config_plugin` is reported as a
/// regular error after every plugin has been registered.
pub fn register_builtins(
    factory: &RegistryFactory,
    config: &SwitchyardConfig,
) -> Result<(), RegistryError> {
    factory.add(Registry::new(RegistryKind::Config.as_str()))?;
    factory.add(Registry::lazy(RegistryKind::ConfigParser.as_str()))?;
    factory.add(Registry::new(RegistryKind::Logger.as_str()))?;

    let builtins: [(RegistryKind, &str, PluginRef); 4] = [
        (
            RegistryKind::Config,
            "filesystem",
            Arc::new(FilesystemConfigPlugin::new(&config.config.path)),
        ),
        (
            RegistryKind::ConfigParser,
            "options",
            Arc::new(KeyedParserPlugin::new(OPTIONS_KEYS.iter().copied())),
        ),
        (RegistryKind::Logger, "tracing", Arc::new(TracingLoggerPlugin::new())),
        (
            RegistryKind::Logger,
            "file",
            Arc::new(FileLoggerPlugin::new(&config.logger.path)),
        ),
    ];

    for (kind, name, plugin) in builtins {
        if config.registry.is_disabled(kind.as_str(), name) {
            tracing::info!(kind = %kind, name, "built-in plugin disabled by configuration");
            continue;
        }
        factory.add_plugin(kind.as_str(), name, plugin)?;
    }

    factory.set_active(RegistryKind::Config.as_str(), &config.registry.config_plugin)
}

/// Sends one result line to every configured logger.
pub fn log_result(
    factory: &RegistryFactory,
    config: &SwitchyardConfig,
    line: &str,
) -> Result<(), RegistryError> {
    let req = request([(logger::FIELD_STRING, line)]);
    factory
        .call(RegistryKind::Logger.as_str(), &config.registry.logger_plugin, &req)
        .map(drop)
}
