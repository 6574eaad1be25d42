// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchyard plugin registry.
//!
//! This crate provides the plugin capability trait, the call payload and
//! routing types, the error taxonomy, and SDK version helpers shared by the
//! registry, the built-in plugins, and dynamically loaded modules.

pub mod error;
pub mod payload;
pub mod plugin;
pub mod types;
pub mod version;

// Re-export key items at crate root for ergonomic imports.
pub use error::{RegistryError, Status};
pub use plugin::{ExternalCaller, Plugin, PluginRef};
pub use types::{
    ModuleId, ModuleInfo, PluginRequest, PluginResponse, RegistryBroadcast, RegistryKind,
    RegistryRoutes, RouteInfo, RouteUuid, Row,
};
pub use version::{SDK_VERSION, version_at_least};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct Echo;

    impl Plugin for Echo {
        fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
            Ok(vec![request.clone()])
        }
    }

    #[test]
    fn plugin_defaults_are_noops() {
        let plugin: PluginRef = std::sync::Arc::new(Echo);
        plugin.assign_name("echo");
        assert!(plugin.set_up().is_ok());
        plugin.configure();
        plugin.tear_down();
        assert!(plugin.route_info().is_empty());

        let request = payload::request([("action", "ping")]);
        let response = plugin.call(&request).expect("echo succeeds");
        assert_eq!(response, vec![request]);
    }

    #[test]
    fn closures_are_external_callers() {
        let caller = |uuid: RouteUuid, kind: &str, name: &str, _req: &PluginRequest| {
            Ok::<_, RegistryError>(vec![payload::request([
                ("uuid", uuid.to_string()),
                ("target", format!("{kind}/{name}")),
            ])])
        };
        let response = ExternalCaller::call(&caller, RouteUuid(9), "config", "remote", &Row::new())
            .expect("closure caller succeeds");
        assert_eq!(response[0]["uuid"], "9");
        assert_eq!(response[0]["target"], "config/remote");
    }

    #[test]
    fn registry_kind_display_round_trip() {
        for kind in [
            RegistryKind::Config,
            RegistryKind::ConfigParser,
            RegistryKind::Logger,
        ] {
            let s = kind.to_string();
            assert_eq!(s, kind.as_str());
            assert_eq!(RegistryKind::from_str(&s).expect("should parse back"), kind);
        }
    }

    #[test]
    fn route_types_serialize_as_nested_maps() {
        let mut broadcast = RegistryBroadcast::new();
        broadcast
            .entry("config".to_string())
            .or_default()
            .insert("remote".to_string(), payload::request([("format", "json")]));
        let json = serde_json::to_value(&broadcast).expect("should serialize");
        assert_eq!(json["config"]["remote"]["format"], "json");
    }
}
