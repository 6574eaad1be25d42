// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload, routing, and module types shared across the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One string-keyed, string-valued mapping, ordered by key.
pub type Row = BTreeMap<String, String>;

/// The request half of a plugin call.
pub type PluginRequest = Row;

/// The response half of a plugin call: an ordered sequence of rows.
pub type PluginResponse = Vec<Row>;

/// Advertised shape of one implementation. The schema belongs to the
/// capability kind; the registry carries it verbatim.
pub type RouteInfo = Row;

/// Item name to route descriptor, for one capability kind.
pub type RegistryRoutes = BTreeMap<String, RouteInfo>;

/// Capability kind to routes: everything one process advertises.
pub type RegistryBroadcast = BTreeMap<String, RegistryRoutes>;

/// Opaque identifier for one external extension connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteUuid(pub u64);

impl fmt::Display for RouteUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a dynamically loaded module while its load scope is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata for one dynamically loaded module.
///
/// `path` is known when the load begins; the remaining fields are filled in
/// when the module declares itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub path: PathBuf,
    pub name: String,
    pub version: String,
    pub min_sdk_version: String,
    pub sdk_version: String,
}

impl ModuleInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Capability kinds compiled into the core distribution.
///
/// Registries are keyed by plain strings so extensions may add kinds this
/// enum does not know about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Config,
    ConfigParser,
    Logger,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Config => "config",
            RegistryKind::ConfigParser => "config_parser",
            RegistryKind::Logger => "logger",
        }
    }
}
