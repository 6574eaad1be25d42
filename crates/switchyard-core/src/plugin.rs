// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin capability set and the external-call seam.
//!
//! Every capability kind (config sources, loggers, parsers, ...) implements
//! [`Plugin`]. Implementations that live in another process are never
//! represented by a `Plugin`; the registry resolves them to a [`RouteUuid`]
//! and hands the call to an [`ExternalCaller`].

use std::sync::Arc;

use crate::error::RegistryError;
use crate::types::{PluginRequest, PluginResponse, RouteInfo, RouteUuid};

/// One named, stateful implementation of a capability.
///
/// Plugins are owned by their registry behind an `Arc`; in-flight calls hold a
/// clone only for the duration of the call.
pub trait Plugin: Send + Sync + 'static {
    /// Receives the registered item name, once per registration and before
    /// the plugin becomes reachable. A plugin's name is set exactly once:
    /// implementations keep the first name they receive (a `OnceLock`
    /// works well), so registering the same `Arc` again never renames it.
    fn assign_name(&self, _name: &str) {}

    /// Acquires whatever state the plugin needs. A failure removes the plugin
    /// from its registry; it is not retried.
    fn set_up(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    /// Releases state. Always called before the registry drops the item.
    fn tear_down(&self) {}

    /// Best-effort refresh with no failure contract.
    fn configure(&self) {}

    /// Handles one call.
    fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError>;

    /// Route descriptor advertised for this item.
    fn route_info(&self) -> RouteInfo {
        RouteInfo::new()
    }
}

/// Shared handle to a registered plugin.
pub type PluginRef = Arc<dyn Plugin>;

/// Transport collaborator that reaches implementations living in an
/// extension process.
///
/// The registry only decides that a call must be forwarded and to which
/// connection; how the bytes travel is entirely up to the implementation.
pub trait ExternalCaller: Send + Sync {
    fn call(
        &self,
        uuid: RouteUuid,
        kind: &str,
        name: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, RegistryError>;
}

impl<F> ExternalCaller for F
where
    F: Fn(RouteUuid, &str, &str, &PluginRequest) -> Result<PluginResponse, RegistryError>
        + Send
        + Sync,
{
    fn call(
        &self,
        uuid: RouteUuid,
        kind: &str,
        name: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, RegistryError> {
        self(uuid, kind, name, request)
    }
}
