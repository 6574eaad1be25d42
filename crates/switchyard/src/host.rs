// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host bootstrap and the inspection commands run against it.

use std::path::Path;

use serde_json::{Value, json};
use switchyard_config::SwitchyardConfig;
use switchyard_core::{PluginRequest, RegistryError};
use switchyard_registry::{ModuleLoader, NativeModuleLoader, RegistryFactory, discover_modules};

/// Builds the factory for `config`: built-in plugins, autoloaded modules,
/// then set-up of every registry.
///
/// Only a fatal registration error is returned. Everything else degrades a
/// single capability and is logged.
pub fn bootstrap(
    config: &SwitchyardConfig,
    loader: &dyn ModuleLoader,
) -> Result<RegistryFactory, RegistryError> {
    let factory = RegistryFactory::new().with_extension_limit(config.extensions.max_connections);

    if let Err(e) = switchyard_plugins::register_builtins(&factory, config) {
        if e.is_fatal() {
            return Err(e);
        }
        tracing::warn!(error = %e, "built-in registration incomplete");
    }

    for entry in &config.modules.autoload {
        for path in discover_modules(Path::new(entry)) {
            match factory.load_module(&path, loader) {
                Ok(id) => tracing::info!(path = %path.display(), module = %id, "module loaded"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "module skipped"),
            }
        }
    }

    let failures = factory.set_up();
    if !failures.is_empty() {
        tracing::warn!(failed = failures.len(), "some plugins failed to set up");
    }
    Ok(factory)
}

/// Bootstraps with the shared-library loader.
pub fn bootstrap_native(config: &SwitchyardConfig) -> Result<RegistryFactory, RegistryError> {
    bootstrap(config, &NativeModuleLoader)
}

/// One entry per registry: kind, item count, active item, laziness.
pub fn registries(factory: &RegistryFactory) -> Value {
    let entries: Vec<Value> = factory
        .all()
        .iter()
        .map(|registry| {
            json!({
                "kind": registry.kind(),
                "count": registry.count(),
                "active": registry.get_active(),
                "lazy": registry.is_lazy(),
                "items": registry.names(),
            })
        })
        .collect();
    Value::Array(entries)
}

pub fn broadcast(factory: &RegistryFactory) -> Result<Value, RegistryError> {
    serde_json::to_value(factory.get_broadcast())
        .map_err(|e| RegistryError::plugin(format!("cannot encode broadcast: {e}")))
}

/// Calls `name` in `kind`, or the active item when `name` is absent.
pub fn call(
    factory: &RegistryFactory,
    kind: &str,
    name: Option<&str>,
    request: &PluginRequest,
) -> Result<Value, RegistryError> {
    let response = match name {
        Some(name) => factory.call(kind, name, request)?,
        None => factory.call_active(kind, request)?,
    };
    serde_json::to_value(response)
        .map_err(|e| RegistryError::plugin(format!("cannot encode response: {e}")))
}

/// Loads one module and reports its declared info.
pub fn load(
    factory: &RegistryFactory,
    path: &Path,
    loader: &dyn ModuleLoader,
) -> Result<Value, RegistryError> {
    let id = factory.load_module(path, loader)?;
    let info = factory.modules().remove(&id).unwrap_or_default();
    Ok(json!({ "id": id, "module": info }))
}

/// Parses one `key=value` request parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
