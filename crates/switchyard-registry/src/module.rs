// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module load serialization.
//!
//! Only one dynamically loaded module may register plugins at a time. The
//! [`ModuleTracker`] holds the "load in progress" flag, the current module
//! id, and every known [`ModuleInfo`] behind a single mutex. A
//! [`ModuleLoadScope`] owns the flag for the duration of one load and purges
//! the module's info if the module never declared itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use switchyard_core::version::sdk_satisfies;
use switchyard_core::{ModuleId, ModuleInfo, RegistryError, SDK_VERSION};

use crate::loader::ModuleHandle;

#[derive(Debug, Default)]
struct ModuleState {
    next_id: u64,
    current: Option<ModuleId>,
    declared: bool,
    modules: BTreeMap<ModuleId, ModuleInfo>,
}

/// Factory-wide module bookkeeping, shared with every registry the factory owns.
#[derive(Debug)]
pub struct ModuleTracker {
    sdk_version: String,
    state: Mutex<ModuleState>,
}

impl ModuleTracker {
    pub fn new() -> Self {
        Self::with_sdk_version(SDK_VERSION)
    }

    /// Creates a tracker that validates modules against `sdk_version`
    /// instead of this crate's own version.
    pub fn with_sdk_version(sdk_version: impl Into<String>) -> Self {
        Self {
            sdk_version: sdk_version.into(),
            state: Mutex::new(ModuleState::default()),
        }
    }

    pub fn sdk_version(&self) -> &str {
        &self.sdk_version
    }

    /// The module whose load is in progress, if any.
    pub fn current(&self) -> Option<ModuleId> {
        self.state.lock().current
    }

    /// Snapshot of every known module.
    pub fn modules(&self) -> BTreeMap<ModuleId, ModuleInfo> {
        self.state.lock().modules.clone()
    }

    pub fn module(&self, id: ModuleId) -> Option<ModuleInfo> {
        self.state.lock().modules.get(&id).cloned()
    }

    /// Claims the load flag and records a fresh module for `path`.
    fn begin(&self, path: &Path) -> Result<ModuleId, RegistryError> {
        let mut state = self.state.lock();
        if let Some(current) = state.current {
            return Err(RegistryError::ModuleLoadInProgress(current));
        }
        state.next_id += 1;
        let id = ModuleId(state.next_id);
        state.modules.insert(id, ModuleInfo::new(path));
        state.current = Some(id);
        state.declared = false;
        Ok(id)
    }

    /// Finalizes the in-progress module's info.
    ///
    /// Fails without touching the info if no load is in progress, the module
    /// already declared itself, or `min_sdk_version` is newer than this SDK.
    pub fn declare(
        &self,
        name: &str,
        version: &str,
        min_sdk_version: &str,
        sdk_version: &str,
    ) -> Result<ModuleId, RegistryError> {
        let mut state = self.state.lock();
        let id = match state.current {
            Some(id) if !state.declared => id,
            _ => return Err(RegistryError::NoModuleLoad),
        };
        if !sdk_satisfies(&self.sdk_version, min_sdk_version) {
            return Err(RegistryError::IncompatibleModule {
                name: name.to_string(),
                min_sdk: min_sdk_version.to_string(),
                sdk: self.sdk_version.clone(),
            });
        }
        let info = state.modules.entry(id).or_default();
        info.name = name.to_string();
        info.version = version.to_string();
        info.min_sdk_version = min_sdk_version.to_string();
        info.sdk_version = sdk_version.to_string();
        state.declared = true;
        Ok(id)
    }

    fn is_declared(&self, id: ModuleId) -> bool {
        let state = self.state.lock();
        state.current == Some(id) && state.declared
    }

    /// Releases the load flag. Returns whether the module declared itself;
    /// an undeclared module's info is purged.
    fn finish(&self, id: ModuleId) -> bool {
        let mut state = self.state.lock();
        if state.current != Some(id) {
            return false;
        }
        let declared = state.declared;
        if !declared {
            state.modules.remove(&id);
        }
        state.current = None;
        state.declared = false;
        declared
    }

    /// Drops a module's info. Returns the info if it was known.
    pub(crate) fn forget(&self, id: ModuleId) -> Option<ModuleInfo> {
        self.state.lock().modules.remove(&id)
    }
}

impl Default for ModuleTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard around one module load.
///
/// Created by [`crate::RegistryFactory::begin_module_load`]. While it lives no
/// other load can begin. Dropping it releases the flag; if the module never
/// declared itself its [`ModuleInfo`] is purged. Plugins the module managed
/// to register are left in place: the caller driving the load decides
/// whether to remove them.
pub struct ModuleLoadScope<'a> {
    tracker: &'a ModuleTracker,
    id: ModuleId,
    path: PathBuf,
    handle: Option<ModuleHandle>,
}

impl<'a> ModuleLoadScope<'a> {
    pub(crate) fn begin(tracker: &'a ModuleTracker, path: &Path) -> Result<Self, RegistryError> {
        let id = tracker.begin(path)?;
        tracing::debug!(module = %id, path = %path.display(), "module load started");
        Ok(Self {
            tracker,
            id,
            path: path.to_path_buf(),
            handle: None,
        })
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the module has successfully called `declare_module`.
    pub fn is_declared(&self) -> bool {
        self.tracker.is_declared(self.id)
    }

    /// Keeps the loaded code's handle until the scope ends.
    pub fn set_handle(&mut self, handle: ModuleHandle) {
        self.handle = Some(handle);
    }
}

impl Drop for ModuleLoadScope<'_> {
    fn drop(&mut self) {
        // Registered plugins may point into the module's code, so the handle
        // is never closed.
        if let Some(handle) = self.handle.take() {
            handle.leak();
        }
        if !self.tracker.finish(self.id) {
            tracing::warn!(
                module = %self.id,
                path = %self.path.display(),
                "module did not declare itself; purged module info"
            );
        }
    }
}
