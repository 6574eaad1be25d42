// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide directory of registries.
//!
//! [`RegistryFactory`] is constructed once at startup and passed by reference
//! to everything that registers or calls plugins. It resolves
//! kind -> registry -> (alias ->) item for every call, hands remote items to
//! the installed [`ExternalCaller`], keeps the per-connection broadcast
//! bookkeeping, and serializes module loads.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use switchyard_core::{
    ExternalCaller, ModuleId, ModuleInfo, PluginRef, PluginRequest, PluginResponse,
    RegistryBroadcast, RegistryError, RouteUuid,
};

use crate::loader::ModuleLoader;
use crate::module::{ModuleLoadScope, ModuleTracker};
use crate::registry::{Registry, Target};

/// Separator for calls addressed to several items at once.
pub const MULTIPLEX_SEPARATOR: char = ',';

const MAX_UUID_ATTEMPTS: usize = 8;

/// Directory of every [`Registry`], keyed by capability kind.
pub struct RegistryFactory {
    registries: RwLock<BTreeMap<String, Arc<Registry>>>,
    extensions: Mutex<BTreeMap<RouteUuid, RegistryBroadcast>>,
    max_extensions: Option<usize>,
    modules: Arc<ModuleTracker>,
    external_caller: RwLock<Option<Arc<dyn ExternalCaller>>>,
}

impl RegistryFactory {
    pub fn new() -> Self {
        Self::with_tracker(ModuleTracker::new())
    }

    /// Creates a factory that validates modules against `sdk_version`.
    pub fn with_sdk_version(sdk_version: impl Into<String>) -> Self {
        Self::with_tracker(ModuleTracker::with_sdk_version(sdk_version))
    }

    fn with_tracker(tracker: ModuleTracker) -> Self {
        Self {
            registries: RwLock::new(BTreeMap::new()),
            extensions: Mutex::new(BTreeMap::new()),
            max_extensions: None,
            modules: Arc::new(tracker),
            external_caller: RwLock::new(None),
        }
    }

    /// Caps the number of live extension connections.
    pub fn with_extension_limit(mut self, max: usize) -> Self {
        self.max_extensions = Some(max);
        self
    }

    // --- Directory ---

    /// Adds a registry for its kind.
    ///
    /// A second registry for the same kind is a wiring bug: the returned
    /// [`RegistryError::DuplicateRegistry`] reports `is_fatal()`.
    pub fn add(&self, registry: Registry) -> Result<Arc<Registry>, RegistryError> {
        let mut registries = self.registries.write();
        let kind = registry.kind().to_string();
        if registries.contains_key(&kind) {
            tracing::error!(kind = %kind, "duplicate registry");
            return Err(RegistryError::DuplicateRegistry(kind));
        }

        registry.bind_modules(Arc::clone(&self.modules));
        let registry = Arc::new(registry);
        registries.insert(kind.clone(), Arc::clone(&registry));
        tracing::debug!(kind = %kind, lazy = registry.is_lazy(), "registry added");
        Ok(registry)
    }

    pub fn registry(&self, kind: &str) -> Result<Arc<Registry>, RegistryError> {
        self.registries
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRegistry(kind.to_string()))
    }

    pub fn exists(&self, kind: &str) -> bool {
        self.registries.read().contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.registries.read().keys().cloned().collect()
    }

    /// Snapshot of every registry.
    pub fn all(&self) -> Vec<Arc<Registry>> {
        self.registries.read().values().cloned().collect()
    }

    // --- Registration ---

    pub fn add_plugin(&self, kind: &str, name: &str, plugin: PluginRef) -> Result<(), RegistryError> {
        self.registry(kind)?.add_plugin(name, plugin)
    }

    pub fn add_internal_plugin(
        &self,
        kind: &str,
        name: &str,
        plugin: PluginRef,
    ) -> Result<(), RegistryError> {
        self.registry(kind)?.add_internal_plugin(name, plugin)
    }

    pub fn plugin(&self, kind: &str, name: &str) -> Result<PluginRef, RegistryError> {
        self.registry(kind)?.plugin(name)
    }

    pub fn set_active(&self, kind: &str, name: &str) -> Result<(), RegistryError> {
        self.registry(kind)?.set_active(name)
    }

    pub fn get_active(&self, kind: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.registry(kind)?.get_active())
    }

    pub fn add_alias(&self, kind: &str, name: &str, alias: &str) -> Result<(), RegistryError> {
        self.registry(kind)?.add_alias(name, alias)
    }

    /// Canonical name for `alias`. Total: unknown kinds and unaliased names
    /// return `alias` unchanged.
    pub fn get_alias(&self, kind: &str, alias: &str) -> String {
        match self.registry(kind) {
            Ok(registry) => registry.get_alias(alias),
            Err(_) => alias.to_string(),
        }
    }

    pub fn item_exists(&self, kind: &str, name: &str, local_only: bool) -> Result<bool, RegistryError> {
        Ok(self.registry(kind)?.exists(name, local_only))
    }

    pub fn names(&self, kind: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self.registry(kind)?.names())
    }

    pub fn count(&self, kind: &str) -> Result<usize, RegistryError> {
        Ok(self.registry(kind)?.count())
    }

    /// Sets up every registry. Per-item failures are returned, never raised.
    pub fn set_up(&self) -> Vec<RegistryError> {
        self.all()
            .iter()
            .flat_map(|registry| registry.set_up())
            .collect()
    }

    pub fn configure(&self) {
        for registry in self.all() {
            registry.configure();
        }
    }

    // --- Dispatch ---

    /// Installs the transport used for items served by extension connections.
    pub fn set_external_caller(&self, caller: impl ExternalCaller + 'static) {
        *self.external_caller.write() = Some(Arc::new(caller));
    }

    /// Calls `name` in registry `kind`.
    ///
    /// A `name` containing [`MULTIPLEX_SEPARATOR`] addresses every listed
    /// item: each is called in order, failures are logged and skipped, and
    /// the multiplexed call itself succeeds with an empty response.
    pub fn call(
        &self,
        kind: &str,
        name: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, RegistryError> {
        let registry = self.registry(kind)?;

        if name.contains(MULTIPLEX_SEPARATOR) {
            for target in name.split(MULTIPLEX_SEPARATOR).map(str::trim) {
                if target.is_empty() {
                    continue;
                }
                if let Err(e) = self.dispatch(&registry, target, request) {
                    tracing::warn!(kind, name = target, error = %e, "multiplexed call target failed");
                }
            }
            return Ok(PluginResponse::new());
        }

        self.dispatch(&registry, name, request)
    }

    /// Calls the active item of registry `kind`.
    pub fn call_active(
        &self,
        kind: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, RegistryError> {
        let active = self
            .registry(kind)?
            .get_active()
            .ok_or_else(|| RegistryError::NoActivePlugin(kind.to_string()))?;
        self.call(kind, &active, request)
    }

    fn dispatch(
        &self,
        registry: &Registry,
        name: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, RegistryError> {
        // The registry lock is released once resolve returns.
        match registry.resolve(name)? {
            Target::Local(plugin) => plugin.call(request),
            Target::External(uuid) => {
                let caller = self.external_caller.read().clone().ok_or_else(|| {
                    RegistryError::NoExternalCaller {
                        kind: registry.kind().to_string(),
                        name: name.to_string(),
                    }
                })?;
                tracing::trace!(kind = registry.kind(), name, %uuid, "forwarding call to extension");
                caller.call(uuid, registry.kind(), name, request)
            }
        }
    }

    // --- Extension routing ---

    /// Every registry's advertised routes, keyed by kind.
    pub fn get_broadcast(&self) -> RegistryBroadcast {
        self.all()
            .iter()
            .map(|registry| (registry.kind().to_string(), registry.get_routes()))
            .collect()
    }

    /// Folds an extension's broadcast into the owning registries.
    ///
    /// Kinds this process does not know are skipped. Either every route is
    /// accepted or none is: conflicts are checked first and a registry that
    /// still fails while applying rolls back the registries already applied.
    pub fn add_broadcast(&self, uuid: RouteUuid, broadcast: RegistryBroadcast) -> Result<(), RegistryError> {
        let mut extensions = self.extensions.lock();
        if extensions.contains_key(&uuid) {
            return Err(RegistryError::DuplicateExtension(uuid));
        }
        if let Some(max) = self.max_extensions {
            if extensions.len() >= max {
                tracing::warn!(%uuid, max, "rejected extension: connection limit reached");
                return Err(RegistryError::ExtensionLimit(max));
            }
        }

        let mut targets = Vec::with_capacity(broadcast.len());
        for (kind, routes) in &broadcast {
            match self.registry(kind) {
                Ok(registry) => {
                    registry.check_external(uuid, routes)?;
                    targets.push((registry, routes));
                }
                Err(_) => tracing::debug!(kind = %kind, %uuid, "skipping broadcast for unknown registry"),
            }
        }

        let mut applied: Vec<&Arc<Registry>> = Vec::with_capacity(targets.len());
        for (registry, routes) in &targets {
            if let Err(e) = registry.add_external(uuid, routes) {
                for done in applied {
                    done.remove_external(uuid);
                }
                tracing::warn!(%uuid, kind = registry.kind(), error = %e, "rejected extension broadcast");
                return Err(e);
            }
            applied.push(registry);
        }

        let routes: usize = targets.iter().map(|(_, routes)| routes.len()).sum();
        extensions.insert(uuid, broadcast);
        tracing::info!(%uuid, routes, "extension registered");
        Ok(())
    }

    /// Revokes every route the connection `uuid` advertised.
    pub fn remove_broadcast(&self, uuid: RouteUuid) -> Result<(), RegistryError> {
        let mut extensions = self.extensions.lock();
        let broadcast = extensions
            .remove(&uuid)
            .ok_or(RegistryError::UnknownExtension(uuid))?;

        for kind in broadcast.keys() {
            if let Ok(registry) = self.registry(kind) {
                registry.remove_external(uuid);
            }
        }
        tracing::info!(%uuid, "extension removed");
        Ok(())
    }

    /// Assigns a fresh connection identifier and registers `broadcast` under it.
    pub fn connect_extension(&self, broadcast: RegistryBroadcast) -> Result<RouteUuid, RegistryError> {
        let mut rng = rand::thread_rng();
        let mut uuid = RouteUuid(0);
        for _ in 0..MAX_UUID_ATTEMPTS {
            uuid = RouteUuid(rng.gen_range(1..=u64::MAX));
            if !self.extensions.lock().contains_key(&uuid) {
                break;
            }
        }
        self.add_broadcast(uuid, broadcast)?;
        Ok(uuid)
    }

    /// Identifiers of every live extension connection.
    pub fn route_uuids(&self) -> Vec<RouteUuid> {
        self.extensions.lock().keys().copied().collect()
    }

    // --- Modules ---

    /// Starts a module load. Fails while another load is in progress.
    pub fn begin_module_load(&self, path: &Path) -> Result<ModuleLoadScope<'_>, RegistryError> {
        ModuleLoadScope::begin(&self.modules, path)
    }

    /// Called by a loading module to finalize its [`ModuleInfo`].
    pub fn declare_module(
        &self,
        name: &str,
        version: &str,
        min_sdk_version: &str,
        sdk_version: &str,
    ) -> Result<ModuleId, RegistryError> {
        let id = self
            .modules
            .declare(name, version, min_sdk_version, sdk_version)
            .inspect_err(|e| tracing::warn!(module = name, error = %e, "module declaration rejected"))?;
        tracing::info!(module = name, version, %id, "module declared");
        Ok(id)
    }

    pub fn current_module(&self) -> Option<ModuleId> {
        self.modules.current()
    }

    /// Whether a module load is in progress.
    pub fn using_module(&self) -> bool {
        self.current_module().is_some()
    }

    pub fn modules(&self) -> BTreeMap<ModuleId, ModuleInfo> {
        self.modules.modules()
    }

    pub fn sdk_version(&self) -> &str {
        self.modules.sdk_version()
    }

    /// Removes every item `module` registered and forgets its info.
    /// Returns how many items were removed.
    pub fn remove_module(&self, module: ModuleId) -> usize {
        let removed: usize = self
            .all()
            .iter()
            .map(|registry| registry.remove_module_items(module).len())
            .sum();
        self.modules.forget(module);
        removed
    }

    /// Loads one module through `loader` under a load scope.
    ///
    /// A module that fails to load, or returns without declaring itself, has
    /// its partial registrations removed.
    pub fn load_module(&self, path: &Path, loader: &dyn ModuleLoader) -> Result<ModuleId, RegistryError> {
        let mut scope = self.begin_module_load(path)?;
        let id = scope.id();

        let outcome = match loader.load(path, self) {
            Ok(handle) => {
                scope.set_handle(handle);
                if scope.is_declared() {
                    Ok(())
                } else {
                    Err(RegistryError::ModuleLoad {
                        path: path.display().to_string(),
                        reason: "module did not declare a compatible SDK".to_string(),
                    })
                }
            }
            Err(e) => Err(e),
        };
        drop(scope);

        match outcome {
            Ok(()) => Ok(id),
            Err(e) => {
                let purged = self.remove_module(id);
                tracing::warn!(path = %path.display(), module = %id, purged, error = %e, "module load failed");
                Err(e)
            }
        }
    }
}

impl Default for RegistryFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RegistryFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryFactory")
            .field("kinds", &self.kinds())
            .field("extensions", &self.route_uuids())
            .field("current_module", &self.current_module())
            .finish()
    }
}
