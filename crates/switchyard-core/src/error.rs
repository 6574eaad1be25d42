// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types and result codes for registry and dispatch operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ModuleId, RouteUuid};

/// The primary error type returned by registry, factory, and plugin operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No registry exists for the requested capability kind.
    #[error("unknown registry: {0}")]
    UnknownRegistry(String),

    /// The registry has no item (local or external) with this name.
    #[error("cannot call registry item: {kind}/{name}")]
    UnknownItem { kind: String, name: String },

    /// No live extension connection has this identifier.
    #[error("unknown extension UUID: {0}")]
    UnknownExtension(RouteUuid),

    /// A call without an item name was made on a registry with no active item.
    #[error("registry {0} has no active plugin")]
    NoActivePlugin(String),

    /// A capability kind was registered twice. Kinds are wired at startup,
    /// so this indicates a programming error.
    #[error("cannot add duplicate registry: {0}")]
    DuplicateRegistry(String),

    #[error("duplicate registry item exists: {kind}/{name}")]
    DuplicateItem { kind: String, name: String },

    #[error("duplicate alias: {kind}/{alias}")]
    DuplicateAlias { kind: String, alias: String },

    /// The connection identifier is already live.
    #[error("duplicate extension UUID: {0}")]
    DuplicateExtension(RouteUuid),

    /// The configured number of live extension connections is reached.
    #[error("extension limit reached ({0} live connections)")]
    ExtensionLimit(usize),

    /// An advertised route collides with a local item or another connection's route.
    #[error("extension route {kind}/{name} conflicts with an existing item")]
    ExternalConflict { kind: String, name: String },

    /// A plugin's `set_up` failed.
    #[error("plugin {kind}/{name} failed to set up: {reason}")]
    SetupFailed {
        kind: String,
        name: String,
        reason: String,
    },

    /// Another module load holds the load scope.
    #[error("module load already in progress (module {0})")]
    ModuleLoadInProgress(ModuleId),

    /// `declare_module` was called outside of a module load.
    #[error("no module load in progress")]
    NoModuleLoad,

    /// The module requires a newer SDK than this core provides.
    #[error("module {name} requires SDK {min_sdk}, core SDK is {sdk}")]
    IncompatibleModule {
        name: String,
        min_sdk: String,
        sdk: String,
    },

    /// Loading a module's code failed, or the module never declared itself.
    #[error("module load failed for {path}: {reason}")]
    ModuleLoad { path: String, reason: String },

    /// An external item was resolved but no transport collaborator is installed.
    #[error("no external caller installed for {kind}/{name}")]
    NoExternalCaller { kind: String, name: String },

    /// Failure reported by the external-call collaborator, propagated verbatim.
    #[error("external call failed ({code}): {message}")]
    External { code: i32, message: String },

    /// Failure reported by a plugin's own `call`.
    #[error("{0}")]
    Plugin(String),
}

impl RegistryError {
    /// Numeric result code for this error. Never `0`.
    pub fn code(&self) -> i32 {
        match self {
            RegistryError::External { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Whether this error must end the process.
    ///
    /// Only duplicate kind registration is fatal; everything else degrades one
    /// capability and the process continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RegistryError::DuplicateRegistry(_))
    }

    /// Shorthand for a plugin-originated failure.
    pub fn plugin(message: impl Into<String>) -> Self {
        RegistryError::Plugin(message.into())
    }
}

/// Result code and message as seen at the call boundary.
///
/// Code `0` means success. Callers should only branch on [`Status::is_ok`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: i32,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "OK".to_string(),
        }
    }

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl From<&RegistryError> for Status {
    fn from(err: &RegistryError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}

impl<T> From<&Result<T, RegistryError>> for Status {
    fn from(result: &Result<T, RegistryError>) -> Self {
        match result {
            Ok(_) => Status::ok(),
            Err(e) => Status::from(e),
        }
    }
}
