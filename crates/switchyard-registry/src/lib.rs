// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin registration and call dispatch for Switchyard.
//!
//! A [`RegistryFactory`] owns one [`Registry`] per capability kind. Plugins
//! are registered at startup, by dynamically loaded modules under a
//! [`ModuleLoadScope`], or advertised by extension processes as broadcasts.
//! Every call goes through the factory, which either invokes a local plugin
//! or forwards to the installed [`switchyard_core::ExternalCaller`].

pub mod factory;
pub mod loader;
pub mod module;
pub mod registry;

pub use factory::{MULTIPLEX_SEPARATOR, RegistryFactory};
pub use loader::{
    MODULE_INIT_SYMBOL, ModuleHandle, ModuleInitFn, ModuleLoader, NativeModuleLoader,
    discover_modules, is_native_module,
};
pub use module::{ModuleLoadScope, ModuleTracker};
pub use registry::{ExternalPluginHook, ItemSource, Registry, Target};
