// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module loaders and the opaque handles they return.

use std::any::Any;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use switchyard_core::RegistryError;

use crate::factory::RegistryFactory;

/// Symbol every native module exports. It registers the module's plugins and
/// must call [`RegistryFactory::declare_module`] before returning.
pub const MODULE_INIT_SYMBOL: &str = "switchyard_module_init";

/// Signature of [`MODULE_INIT_SYMBOL`]. Modules must be built with the same
/// toolchain and `switchyard-registry` version as the host.
pub type ModuleInitFn = unsafe fn(&RegistryFactory);

/// Opaque resource keeping loaded module code alive.
///
/// Handles are never closed: once the load scope ends the handle is leaked.
/// Unloading is expensive and unsafe while plugins registered by the module
/// are still reachable.
pub struct ModuleHandle(Box<dyn Any + Send + Sync>);

impl ModuleHandle {
    pub fn new<T: Any + Send + Sync>(resource: T) -> Self {
        Self(Box::new(resource))
    }

    /// A handle with nothing behind it, for in-process loaders.
    pub fn empty() -> Self {
        Self::new(())
    }

    pub(crate) fn leak(self) {
        std::mem::forget(self.0);
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ModuleHandle(..)")
    }
}

/// Runs one module's initialization against the factory.
///
/// Called while the factory's load scope is held; the module's plugin
/// registrations are tagged with the in-progress module id.
pub trait ModuleLoader {
    fn load(&self, path: &Path, factory: &RegistryFactory) -> Result<ModuleHandle, RegistryError>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&Path, &RegistryFactory) -> Result<ModuleHandle, RegistryError>,
{
    fn load(&self, path: &Path, factory: &RegistryFactory) -> Result<ModuleHandle, RegistryError> {
        self(path, factory)
    }
}

/// Loads shared libraries exporting [`MODULE_INIT_SYMBOL`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeModuleLoader;

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, path: &Path, factory: &RegistryFactory) -> Result<ModuleHandle, RegistryError> {
        let load_error = |reason: String| RegistryError::ModuleLoad {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(load_error("no such file".to_string()));
        }

        // SAFETY: loading a library runs its initializers; modules are trusted
        // code named explicitly by configuration.
        let library = unsafe { Library::new(path) }
            .map_err(|e| load_error(format!("failed to load library: {e}")))?;

        {
            // SAFETY: the symbol type is the documented module ABI.
            let init: Symbol<ModuleInitFn> = unsafe { library.get(MODULE_INIT_SYMBOL.as_bytes()) }
                .map_err(|e| load_error(format!("missing {MODULE_INIT_SYMBOL}: {e}")))?;
            // SAFETY: the library stays loaded for the rest of the process.
            unsafe { (*init)(factory) };
        }

        Ok(ModuleHandle::new(library))
    }
}

/// Returns true if `path` has the platform's shared library extension.
pub fn is_native_module(path: &Path) -> bool {
    let expected = if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    };
    path.extension().and_then(|e| e.to_str()) == Some(expected)
}

/// Expands a configured autoload entry: directories yield their native
/// modules (sorted), files are returned as-is.
pub fn discover_modules(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut modules: Vec<PathBuf> = match std::fs::read_dir(path) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| is_native_module(p))
            .collect(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read module directory");
            Vec::new()
        }
    };
    modules.sort();
    modules
}
