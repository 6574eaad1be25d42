// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of every implementation of one capability kind.
//!
//! A [`Registry`] owns its local items, their aliases and internal flags,
//! the optional active selection, and the names advertised by external
//! connections. All state sits behind one reader/writer lock so contention
//! stays local to a single kind. Plugin code never runs under that lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use switchyard_core::{
    ModuleId, PluginRef, PluginRequest, PluginResponse, RegistryError, RegistryRoutes, RouteInfo,
    RouteUuid,
};

use crate::module::ModuleTracker;

/// Where a local item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    /// Compiled in, or registered outside any module load.
    Builtin,
    /// Registered while this module's load scope was held.
    Module(ModuleId),
}

/// Result of resolving a call target.
#[derive(Clone)]
pub enum Target {
    Local(PluginRef),
    External(RouteUuid),
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Local(_) => f.write_str("Local(..)"),
            Target::External(uuid) => write!(f, "External({uuid})"),
        }
    }
}

/// Per-registry reaction to external items coming and going.
///
/// A registry whose kind needs a local stand-in for every remote item (for
/// example to expose a schema) installs a hook; the stand-in is revoked
/// together with the connection.
///
/// Hooks run without the registry lock, so they may read or register items.
/// Connection changes are serialized by the factory while they run: a hook
/// must not add or remove broadcasts, or list connections.
pub trait ExternalPluginHook: Send + Sync {
    fn add_external_plugin(&self, name: &str, route: &RouteInfo) -> Result<(), RegistryError>;

    fn remove_external_plugin(&self, name: &str);
}

#[derive(Default)]
struct RegistryState {
    items: BTreeMap<String, PluginRef>,
    aliases: BTreeMap<String, String>,
    internal: BTreeSet<String>,
    active: Option<String>,
    set_up: bool,
    external: BTreeMap<String, RouteUuid>,
    routes: BTreeMap<String, RouteInfo>,
    modules: BTreeMap<String, ModuleId>,
}

impl RegistryState {
    fn exists(&self, name: &str, local_only: bool) -> bool {
        let local = self.items.contains_key(name);
        if local_only {
            return local;
        }
        local || self.external.contains_key(name) || self.routes.contains_key(name)
    }

    /// Local name first, then an alias naming a local item.
    fn local(&self, name: &str) -> Option<&PluginRef> {
        self.items.get(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|canonical| self.items.get(canonical))
        })
    }

    fn check_external(
        &self,
        kind: &str,
        uuid: RouteUuid,
        routes: &RegistryRoutes,
    ) -> Result<(), RegistryError> {
        for name in routes.keys() {
            let owned_elsewhere = self.external.get(name).is_some_and(|owner| *owner != uuid);
            let local = self.items.contains_key(name) || self.aliases.contains_key(name);
            if local || owned_elsewhere {
                return Err(RegistryError::ExternalConflict {
                    kind: kind.to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// All implementations of one capability kind.
pub struct Registry {
    kind: String,
    auto_setup: bool,
    hook: Option<Box<dyn ExternalPluginHook>>,
    tracker: OnceLock<Arc<ModuleTracker>>,
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Creates a registry whose items are set up by [`Registry::set_up`].
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            auto_setup: true,
            hook: None,
            tracker: OnceLock::new(),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Creates a registry that never sets up its items; its users do so on demand.
    pub fn lazy(kind: impl Into<String>) -> Self {
        Self {
            auto_setup: false,
            ..Self::new(kind)
        }
    }

    pub fn with_external_hook(mut self, hook: impl ExternalPluginHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_lazy(&self) -> bool {
        !self.auto_setup
    }

    /// Shares the owning factory's module tracker. Only the first call binds.
    pub(crate) fn bind_modules(&self, tracker: Arc<ModuleTracker>) {
        let _ = self.tracker.set(tracker);
    }

    fn current_module(&self) -> Option<ModuleId> {
        self.tracker.get().and_then(|t| t.current())
    }

    fn unknown(&self, name: &str) -> RegistryError {
        RegistryError::UnknownItem {
            kind: self.kind.clone(),
            name: name.to_string(),
        }
    }

    /// Registers `plugin` under `name`.
    pub fn add_plugin(&self, name: &str, plugin: PluginRef) -> Result<(), RegistryError> {
        self.insert(name, plugin, false)
    }

    /// Registers `plugin` under `name` without advertising it in routes.
    pub fn add_internal_plugin(&self, name: &str, plugin: PluginRef) -> Result<(), RegistryError> {
        self.insert(name, plugin, true)
    }

    fn duplicate(&self, name: &str) -> RegistryError {
        RegistryError::DuplicateItem {
            kind: self.kind.clone(),
            name: name.to_string(),
        }
    }

    fn insert(&self, name: &str, plugin: PluginRef, internal: bool) -> Result<(), RegistryError> {
        let module = self.current_module();
        if self.state.read().items.contains_key(name) {
            return Err(self.duplicate(name));
        }
        plugin.assign_name(name);

        let mut state = self.state.write();
        if state.items.contains_key(name) {
            return Err(self.duplicate(name));
        }
        state.items.insert(name.to_string(), plugin);
        if internal {
            state.internal.insert(name.to_string());
        }
        if let Some(module) = module {
            state.modules.insert(name.to_string(), module);
        }
        tracing::debug!(kind = %self.kind, name, internal, module = ?module, "registered plugin");
        Ok(())
    }

    /// Tears down and removes a local item along with every alias masking it.
    /// Removing an unknown name is a no-op.
    pub fn remove(&self, name: &str) {
        let detached = {
            let mut state = self.state.write();
            Self::detach_locked(&mut state, name)
        };
        if let Some(plugin) = detached {
            plugin.tear_down();
        }
    }

    /// Removes `name` only if it came from `source`. Returns whether it was removed.
    pub fn remove_from(&self, name: &str, source: ItemSource) -> bool {
        let detached = {
            let mut state = self.state.write();
            if !state.items.contains_key(name) || Self::source_locked(&state, name) != source {
                return false;
            }
            Self::detach_locked(&mut state, name)
        };
        if let Some(plugin) = detached {
            plugin.tear_down();
        }
        true
    }

    /// Removes `name` only while it is still registered as `plugin`.
    fn remove_if_same(&self, name: &str, plugin: &PluginRef) -> bool {
        let detached = {
            let mut state = self.state.write();
            if !state.items.get(name).is_some_and(|current| Arc::ptr_eq(current, plugin)) {
                return false;
            }
            Self::detach_locked(&mut state, name)
        };
        if let Some(plugin) = detached {
            plugin.tear_down();
        }
        true
    }

    /// Unlinks a local item. The caller tears it down once the lock is released.
    fn detach_locked(state: &mut RegistryState, name: &str) -> Option<PluginRef> {
        let plugin = state.items.remove(name)?;
        state.internal.remove(name);
        state.modules.remove(name);
        state.aliases.retain(|_, canonical| canonical != name);
        Some(plugin)
    }

    fn source_locked(state: &RegistryState, name: &str) -> ItemSource {
        state
            .modules
            .get(name)
            .map_or(ItemSource::Builtin, |id| ItemSource::Module(*id))
    }

    /// Source of a local item, or `None` if it is not registered locally.
    pub fn source(&self, name: &str) -> Option<ItemSource> {
        let state = self.state.read();
        state
            .items
            .contains_key(name)
            .then(|| Self::source_locked(&state, name))
    }

    /// Removes every local item contributed by `module`. Returns their names.
    pub fn remove_module_items(&self, module: ModuleId) -> Vec<String> {
        let (names, detached) = {
            let mut state = self.state.write();
            let names: Vec<String> = state
                .modules
                .iter()
                .filter(|(_, id)| **id == module)
                .map(|(name, _)| name.clone())
                .collect();
            let detached: Vec<PluginRef> = names
                .iter()
                .filter_map(|name| Self::detach_locked(&mut state, name))
                .collect();
            (names, detached)
        };
        for plugin in detached {
            plugin.tear_down();
        }
        names
    }

    /// Records `alias -> name`. The target must be a local item and the alias unused.
    pub fn add_alias(&self, name: &str, alias: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        if state.aliases.contains_key(alias) {
            return Err(RegistryError::DuplicateAlias {
                kind: self.kind.clone(),
                alias: alias.to_string(),
            });
        }
        if !state.items.contains_key(name) {
            return Err(self.unknown(name));
        }
        state.aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    /// The canonical name for `alias`, or `alias` itself when it is not an alias.
    pub fn get_alias(&self, alias: &str) -> String {
        self.state
            .read()
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_else(|| alias.to_string())
    }

    pub fn is_internal(&self, name: &str) -> bool {
        self.state.read().internal.contains(name)
    }

    /// Route table for every advertised local item.
    ///
    /// Internal items are skipped. An item masked by aliases is advertised
    /// once per alias and not under its own name.
    pub fn get_routes(&self) -> RegistryRoutes {
        let advertised: Vec<(String, PluginRef)> = {
            let state = self.state.read();
            let mut advertised = Vec::with_capacity(state.items.len());
            for (name, plugin) in &state.items {
                if state.internal.contains(name) {
                    continue;
                }

                let before = advertised.len();
                for (alias, canonical) in &state.aliases {
                    if canonical == name {
                        advertised.push((alias.clone(), Arc::clone(plugin)));
                    }
                }
                if advertised.len() == before {
                    advertised.push((name.clone(), Arc::clone(plugin)));
                }
            }
            advertised
        };

        advertised
            .into_iter()
            .map(|(name, plugin)| (name, plugin.route_info()))
            .collect()
    }

    /// Resolves `name` to a local plugin or the connection serving it.
    ///
    /// Local names win over aliases, and aliases over external items.
    pub fn resolve(&self, name: &str) -> Result<Target, RegistryError> {
        let state = self.state.read();
        if let Some(plugin) = state.local(name) {
            return Ok(Target::Local(Arc::clone(plugin)));
        }
        match state.external.get(name) {
            Some(uuid) => Ok(Target::External(*uuid)),
            None => Err(self.unknown(name)),
        }
    }

    /// Calls a local item. External items are the factory's concern.
    pub fn call(&self, name: &str, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        let plugin = self.plugin(name)?;
        plugin.call(request)
    }

    /// Borrows a local item (by name or alias) for direct use.
    pub fn plugin(&self, name: &str) -> Result<PluginRef, RegistryError> {
        self.state
            .read()
            .local(name)
            .cloned()
            .ok_or_else(|| self.unknown(name))
    }

    /// Snapshot of every local item.
    pub fn plugins(&self) -> BTreeMap<String, PluginRef> {
        self.state.read().items.clone()
    }

    /// Restricts the registry to a single live item.
    ///
    /// Unknown names fail and leave the selection unchanged. Once the
    /// registry has been set up, a newly selected local item is set up
    /// before the selection takes effect.
    pub fn set_active(&self, name: &str) -> Result<(), RegistryError> {
        let (plugin, already_set_up) = {
            let state = self.state.read();
            if !state.exists(name, false) {
                return Err(self.unknown(name));
            }
            (state.items.get(name).cloned(), state.set_up)
        };

        if let Some(plugin) = plugin.filter(|_| already_set_up && self.auto_setup) {
            plugin.set_up().map_err(|e| RegistryError::SetupFailed {
                kind: self.kind.clone(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        }

        self.state.write().active = Some(name.to_string());
        tracing::info!(kind = %self.kind, name, "active plugin selected");
        Ok(())
    }

    pub fn get_active(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    /// Sets up the active item, or every item when none is active.
    ///
    /// Items whose `set_up` fails are removed; their errors are logged and
    /// returned, never propagated. Lazy registries do nothing.
    pub fn set_up(&self) -> Vec<RegistryError> {
        if !self.auto_setup {
            return Vec::new();
        }

        let targets: Vec<(String, PluginRef)> = {
            let state = self.state.read();
            match state
                .active
                .as_ref()
                .and_then(|a| state.items.get_key_value(a))
            {
                Some((name, plugin)) => vec![(name.clone(), Arc::clone(plugin))],
                None => state
                    .items
                    .iter()
                    .map(|(n, p)| (n.clone(), Arc::clone(p)))
                    .collect(),
            }
        };

        let mut failures = Vec::new();
        for (name, plugin) in targets {
            if let Err(e) = plugin.set_up() {
                tracing::warn!(kind = %self.kind, name = %name, error = %e, "plugin failed to set up");
                failures.push(RegistryError::SetupFailed {
                    kind: self.kind.clone(),
                    name: name.clone(),
                    reason: e.to_string(),
                });
                if self.remove_if_same(&name, &plugin) {
                    tracing::info!(kind = %self.kind, name = %name, "removed plugin after failed set up");
                } else {
                    tracing::debug!(kind = %self.kind, name = %name, "plugin replaced during set up; keeping replacement");
                }
            }
        }

        self.state.write().set_up = true;
        failures
    }

    /// Refreshes the active local item, or every item when none is active.
    pub fn configure(&self) {
        let targets: Vec<PluginRef> = {
            let state = self.state.read();
            match state.active.as_ref().and_then(|a| state.items.get(a)) {
                Some(plugin) => vec![Arc::clone(plugin)],
                None => state.items.values().cloned().collect(),
            }
        };
        for plugin in targets {
            plugin.configure();
        }
    }

    /// Fails if any route in `routes` would collide with this registry's items.
    pub fn check_external(&self, uuid: RouteUuid, routes: &RegistryRoutes) -> Result<(), RegistryError> {
        self.state.read().check_external(&self.kind, uuid, routes)
    }

    /// Records every route in `routes` as served by `uuid`.
    ///
    /// All-or-nothing: conflicts are detected before any mutation, and a
    /// failing external hook rolls back the routes it already accepted.
    /// Hooks run without the registry lock; conflicts are checked again
    /// before the routes are recorded.
    pub fn add_external(&self, uuid: RouteUuid, routes: &RegistryRoutes) -> Result<(), RegistryError> {
        self.check_external(uuid, routes)?;

        if let Some(hook) = &self.hook {
            let mut accepted: Vec<&str> = Vec::with_capacity(routes.len());
            for (name, route) in routes {
                if let Err(e) = hook.add_external_plugin(name, route) {
                    for done in accepted {
                        hook.remove_external_plugin(done);
                    }
                    return Err(e);
                }
                accepted.push(name.as_str());
            }
        }

        let recorded = {
            let mut state = self.state.write();
            state.check_external(&self.kind, uuid, routes).map(|()| {
                for (name, route) in routes {
                    state.routes.insert(name.clone(), route.clone());
                    state.external.insert(name.clone(), uuid);
                }
            })
        };
        if recorded.is_err() {
            self.revoke_shadows(routes.keys());
        }
        recorded
    }

    /// Revokes everything served by `uuid`. Returns the revoked names.
    pub fn remove_external(&self, uuid: RouteUuid) -> Vec<String> {
        let names: Vec<String> = {
            let mut state = self.state.write();
            let names: Vec<String> = state
                .external
                .iter()
                .filter(|(_, owner)| **owner == uuid)
                .map(|(name, _)| name.clone())
                .collect();
            for name in &names {
                state.external.remove(name);
                state.routes.remove(name);
            }
            names
        };
        self.revoke_shadows(&names);
        names
    }

    fn revoke_shadows<'a>(&self, names: impl IntoIterator<Item = &'a String>) {
        if let Some(hook) = &self.hook {
            for name in names {
                hook.remove_external_plugin(name);
            }
        }
    }

    /// True if `name` is a local item, or (unless `local_only`) an external item.
    pub fn exists(&self, name: &str, local_only: bool) -> bool {
        self.state.read().exists(name, local_only)
    }

    /// Local item names followed by external item names.
    pub fn names(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .items
            .keys()
            .chain(state.external.keys())
            .cloned()
            .collect()
    }

    /// Number of local and external items.
    pub fn count(&self) -> usize {
        let state = self.state.read();
        state.items.len() + state.external.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("auto_setup", &self.auto_setup)
            .field("items", &state.items.keys().collect::<Vec<_>>())
            .field("active", &state.active)
            .field("external", &state.external)
            .finish()
    }
}
