// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for dispatch, extension routing, and module loads.

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Barrier, OnceLock, Weak};
use std::time::Duration;

use switchyard_core::payload::request;
use switchyard_core::{
    Plugin, PluginRequest, PluginResponse, RegistryBroadcast, RegistryError, RegistryRoutes,
    RouteInfo, RouteUuid, Row,
};
use switchyard_registry::{
    ExternalPluginHook, ItemSource, ModuleHandle, Registry, RegistryFactory,
};
use switchyard_test_utils::{ForwardedCall, MockPlugin, RecordingCaller};

fn factory_with(kinds: &[&str]) -> RegistryFactory {
    let factory = RegistryFactory::new();
    for kind in kinds {
        factory.add(Registry::new(*kind)).expect("add registry");
    }
    factory
}

fn routes(names: &[&str]) -> RegistryRoutes {
    names
        .iter()
        .map(|name| (name.to_string(), request([("owner", "extension")])))
        .collect()
}

// --- Multiplexed calls ---

#[test]
fn multiplexed_logger_call_survives_failing_target() {
    let factory = factory_with(&["logger"]);
    let syslog = MockPlugin::new().shared();
    let filelog = MockPlugin::failing("disk full").shared();
    factory.add_plugin("logger", "syslog", syslog.clone()).expect("add");
    factory.add_plugin("logger", "filelog", filelog.clone()).expect("add");

    let req = request([("string", "hello")]);
    let response = factory
        .call("logger", "syslog,filelog", &req)
        .expect("multiplexed call succeeds");

    assert!(response.is_empty());
    assert_eq!(syslog.requests(), vec![req.clone()]);
    assert_eq!(filelog.requests(), vec![req]);
}

#[test]
fn multiplexed_call_reaches_targets_after_a_failure() {
    let factory = factory_with(&["logger"]);
    let first = MockPlugin::new().shared();
    let middle = MockPlugin::failing("broken").shared();
    let last = MockPlugin::new().shared();
    factory.add_plugin("logger", "a", first.clone()).expect("add");
    factory.add_plugin("logger", "b", middle.clone()).expect("add");
    factory.add_plugin("logger", "c", last.clone()).expect("add");

    factory.call("logger", "a, b ,c", &Row::new()).expect("success overall");
    assert_eq!(first.call_count(), 1);
    assert_eq!(middle.call_count(), 1);
    assert_eq!(last.call_count(), 1);
}

#[test]
fn multiplexed_call_tolerates_unknown_and_empty_targets() {
    let factory = factory_with(&["logger"]);
    let known = MockPlugin::new().shared();
    factory.add_plugin("logger", "known", known.clone()).expect("add");

    factory.call("logger", "ghost,,known,", &Row::new()).expect("success overall");
    assert_eq!(known.call_count(), 1);
}

// --- Registration scenarios ---

#[test]
fn duplicate_item_keeps_first_plugin() {
    let factory = factory_with(&["cfg"]);
    let first = MockPlugin::new().shared();
    let second = MockPlugin::new().shared();
    factory.add_plugin("cfg", "tls", first.clone()).expect("first add");

    let err = factory.add_plugin("cfg", "tls", second.clone()).expect_err("conflict");
    assert!(matches!(err, RegistryError::DuplicateItem { .. }));
    assert!(!err.is_fatal());

    factory.call("cfg", "tls", &Row::new()).expect("call");
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 0);
    assert_eq!(factory.count("cfg").expect("count"), 1);
}

#[test]
fn failed_set_active_keeps_previous_selection() {
    let factory = factory_with(&["cfg"]);
    factory.add_plugin("cfg", "tls", MockPlugin::new().shared()).expect("add");
    factory.set_active("cfg", "tls").expect("select tls");

    let err = factory.set_active("cfg", "unknown").expect_err("unknown item");
    assert!(matches!(err, RegistryError::UnknownItem { .. }));
    assert_eq!(factory.get_active("cfg").expect("kind exists").as_deref(), Some("tls"));
}

#[test]
fn factory_set_up_isolates_failures() {
    let factory = factory_with(&["config", "logger"]);
    let healthy = MockPlugin::new().shared();
    let broken = MockPlugin::failing_setup("missing path").shared();
    factory.add_plugin("config", "fs", healthy.clone()).expect("add");
    factory.add_plugin("logger", "file", broken.clone()).expect("add");

    let failures = factory.set_up();
    assert_eq!(failures.len(), 1);
    assert_eq!(healthy.setup_count(), 1);
    assert_eq!(broken.teardown_count(), 1);
    assert!(!factory.item_exists("logger", "file", true).expect("kind exists"));
}

// --- Extension routing ---

#[test]
fn external_items_dispatch_through_caller() {
    let factory = factory_with(&["config"]);
    let caller = RecordingCaller::new();
    factory.set_external_caller(caller.clone());

    let uuid = RouteUuid(77);
    let broadcast = RegistryBroadcast::from([("config".to_string(), routes(&["remote"]))]);
    factory.add_broadcast(uuid, broadcast).expect("broadcast");

    let req = request([("action", "genConfig")]);
    let response = factory.call("config", "remote", &req).expect("forwarded");
    assert_eq!(response[0]["served_by"], "config/remote");
    assert_eq!(
        caller.calls(),
        vec![ForwardedCall {
            uuid,
            kind: "config".to_string(),
            name: "remote".to_string(),
            request: req,
        }]
    );
}

#[test]
fn external_failures_propagate_unchanged() {
    let factory = factory_with(&["config"]);
    let caller = RecordingCaller::new();
    caller.fail_for(RouteUuid(5), 3, "extension went away");
    factory.set_external_caller(caller);

    let broadcast = RegistryBroadcast::from([("config".to_string(), routes(&["remote"]))]);
    factory.add_broadcast(RouteUuid(5), broadcast).expect("broadcast");

    let err = factory.call("config", "remote", &Row::new()).expect_err("transport failure");
    assert_eq!(err.code(), 3);
    assert_eq!(err.to_string(), "external call failed (3): extension went away");
}

#[test]
fn local_items_win_over_external_dispatch() {
    let factory = factory_with(&["config"]);
    let caller = RecordingCaller::new();
    factory.set_external_caller(caller.clone());
    let local = MockPlugin::new().shared();
    factory.add_plugin("config", "fs", local.clone()).expect("add");

    factory.call("config", "fs", &Row::new()).expect("local call");
    assert_eq!(local.call_count(), 1);
    assert!(caller.calls().is_empty());
}

/// Runs `work` on another thread and fails instead of hanging if it never returns.
fn within_deadline<T: Send + 'static>(work: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("call blocked on a registry lock")
}

/// Config plugin that registers a sibling from inside its own call.
#[derive(Default)]
struct Registrar {
    factory: OnceLock<Weak<RegistryFactory>>,
}

impl Plugin for Registrar {
    fn call(&self, _request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        let factory = self
            .factory
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| RegistryError::plugin("factory gone"))?;
        factory.add_plugin("config", "late", MockPlugin::new().shared())?;
        let names = factory.names("config")?.join(",");
        Ok(vec![request([("names", names)])])
    }
}

#[test]
fn plugin_call_may_reenter_the_factory() {
    let factory = Arc::new(factory_with(&["config"]));
    let registrar = Arc::new(Registrar::default());
    let _ = registrar.factory.set(Arc::downgrade(&factory));
    factory.add_plugin("config", "registrar", registrar).expect("add");

    let worker = Arc::clone(&factory);
    let response = within_deadline(move || worker.call("config", "registrar", &Row::new()))
        .expect("re-entrant call");

    assert_eq!(response[0]["names"], "late,registrar");
    assert!(factory.item_exists("config", "late", true).expect("kind"));
}

#[test]
fn external_caller_may_reenter_the_factory() {
    let factory = Arc::new(factory_with(&["config"]));
    let weak = Arc::downgrade(&factory);
    factory.set_external_caller(
        move |uuid: RouteUuid,
              kind: &str,
              _name: &str,
              _request: &PluginRequest|
              -> Result<PluginResponse, RegistryError> {
            let factory = weak
                .upgrade()
                .ok_or_else(|| RegistryError::plugin("factory gone"))?;
            let live = factory.route_uuids().contains(&uuid);
            let names = factory.names(kind)?.join(",");
            Ok(vec![request([("live", live.to_string()), ("names", names)])])
        },
    );
    let broadcast = RegistryBroadcast::from([("config".to_string(), routes(&["remote"]))]);
    factory.add_broadcast(RouteUuid(12), broadcast).expect("broadcast");

    let worker = Arc::clone(&factory);
    let response = within_deadline(move || worker.call("config", "remote", &Row::new()))
        .expect("re-entrant external call");

    assert_eq!(response[0]["live"], "true");
    assert_eq!(response[0]["names"], "remote");
}

#[test]
fn add_then_remove_broadcast_leaves_no_residue() {
    let factory = factory_with(&["config", "logger"]);
    let uuid = RouteUuid(9);
    let broadcast = RegistryBroadcast::from([
        ("config".to_string(), routes(&["p"])),
        ("logger".to_string(), routes(&["q"])),
    ]);
    factory.add_broadcast(uuid, broadcast).expect("broadcast");
    assert!(factory.item_exists("config", "p", false).expect("kind"));
    assert!(!factory.item_exists("config", "p", true).expect("kind"));
    assert_eq!(factory.names("logger").expect("kind"), vec!["q".to_string()]);

    factory.remove_broadcast(uuid).expect("remove");
    for (kind, name) in [("config", "p"), ("logger", "q")] {
        assert!(!factory.item_exists(kind, name, true).expect("kind"));
        assert!(!factory.item_exists(kind, name, false).expect("kind"));
    }
    assert!(factory.route_uuids().is_empty());
    assert_eq!(
        factory.remove_broadcast(uuid),
        Err(RegistryError::UnknownExtension(uuid))
    );
}

#[test]
fn conflicting_broadcast_is_rejected_whole() {
    let factory = factory_with(&["config", "logger"]);
    factory.add_plugin("logger", "syslog", MockPlugin::new().shared()).expect("add");

    let broadcast = RegistryBroadcast::from([
        ("config".to_string(), routes(&["remote_cfg"])),
        ("logger".to_string(), routes(&["syslog"])),
    ]);
    let err = factory.add_broadcast(RouteUuid(3), broadcast).expect_err("conflict");
    assert!(matches!(err, RegistryError::ExternalConflict { .. }));
    assert!(!factory.item_exists("config", "remote_cfg", false).expect("kind"));
    assert!(factory.route_uuids().is_empty());
}

struct RejectingHook;

impl ExternalPluginHook for RejectingHook {
    fn add_external_plugin(&self, name: &str, _route: &RouteInfo) -> Result<(), RegistryError> {
        Err(RegistryError::plugin(format!("cannot attach {name}")))
    }

    fn remove_external_plugin(&self, _name: &str) {}
}

#[test]
fn hook_failure_rolls_back_registries_already_applied() {
    let factory = RegistryFactory::new();
    factory.add(Registry::new("config")).expect("add");
    factory
        .add(Registry::new("table").with_external_hook(RejectingHook))
        .expect("add");

    let broadcast = RegistryBroadcast::from([
        ("config".to_string(), routes(&["remote_cfg"])),
        ("table".to_string(), routes(&["remote_table"])),
    ]);
    assert!(factory.add_broadcast(RouteUuid(8), broadcast).is_err());
    assert!(!factory.item_exists("config", "remote_cfg", false).expect("kind"));
    assert!(!factory.item_exists("table", "remote_table", false).expect("kind"));
    assert!(factory.route_uuids().is_empty());
}

#[test]
fn aliases_shape_the_broadcast() {
    let factory = factory_with(&["config"]);
    let plugin = MockPlugin::new()
        .with_route(request([("format", "json")]))
        .shared();
    factory.add_plugin("config", "filesystem", plugin).expect("add");
    factory.add_alias("config", "filesystem", "fs").expect("alias");
    factory
        .add_internal_plugin("config", "bootstrap", MockPlugin::new().shared())
        .expect("add");

    let broadcast = factory.get_broadcast();
    let names: Vec<&String> = broadcast["config"].keys().collect();
    assert_eq!(names, vec!["fs"]);
    assert_eq!(broadcast["config"]["fs"]["format"], "json");
    assert_eq!(factory.get_alias("config", "fs"), "filesystem");
}

// --- Modules ---

#[test]
fn concurrent_module_loads_are_serialized() {
    let factory = RegistryFactory::new();
    let held = Barrier::new(2);
    let attempted = Barrier::new(2);

    std::thread::scope(|s| {
        let first = s.spawn(|| {
            let scope = factory
                .begin_module_load(Path::new("/opt/first.so"))
                .expect("first load acquires scope");
            held.wait();
            attempted.wait();
            let info = factory.modules()[&scope.id()].clone();
            assert_eq!(info.path, Path::new("/opt/first.so"));
            scope.id()
        });

        let second = s.spawn(|| {
            held.wait();
            let result = factory.begin_module_load(Path::new("/opt/second.so"));
            let in_progress = matches!(result, Err(RegistryError::ModuleLoadInProgress(_)));
            drop(result);
            attempted.wait();
            in_progress
        });

        let first_id = first.join().expect("first thread");
        assert!(second.join().expect("second thread"));
        assert!(factory.modules().get(&first_id).is_none());
    });

    assert!(!factory.using_module());
}

#[test]
fn declared_module_keeps_its_plugins() {
    let factory = factory_with(&["config"]);
    let loader = |_path: &Path, factory: &RegistryFactory| -> Result<ModuleHandle, RegistryError> {
        factory.add_plugin("config", "from_module", MockPlugin::new().shared())?;
        factory.declare_module("example", "1.0.0", "0.0.1", "0.1.0")?;
        Ok(ModuleHandle::empty())
    };

    let id = factory
        .load_module(Path::new("/opt/example.so"), &loader)
        .expect("module loads");
    let registry = factory.registry("config").expect("kind");
    assert_eq!(registry.source("from_module"), Some(ItemSource::Module(id)));
    assert_eq!(factory.modules()[&id].name, "example");
    assert!(!factory.using_module());

    assert_eq!(factory.remove_module(id), 1);
    assert!(!registry.exists("from_module", true));
    assert!(factory.modules().is_empty());
}

#[test]
fn undeclared_module_is_purged() {
    let factory = factory_with(&["config"]);
    let loader = |_path: &Path, factory: &RegistryFactory| -> Result<ModuleHandle, RegistryError> {
        factory.add_plugin("config", "orphan", MockPlugin::new().shared())?;
        Ok(ModuleHandle::empty())
    };

    let err = factory
        .load_module(Path::new("/opt/silent.so"), &loader)
        .expect_err("module never declared itself");
    assert!(matches!(err, RegistryError::ModuleLoad { .. }));
    assert!(!factory.item_exists("config", "orphan", true).expect("kind"));
    assert!(factory.modules().is_empty());
}

#[test]
fn incompatible_module_is_purged() {
    let factory = RegistryFactory::with_sdk_version("1.0.0");
    factory.add(Registry::new("config")).expect("add");
    let loader = |_path: &Path, factory: &RegistryFactory| -> Result<ModuleHandle, RegistryError> {
        factory.add_plugin("config", "too_new", MockPlugin::new().shared())?;
        let declared = factory.declare_module("too_new", "1.0.0", "2.0.0", "2.0.0");
        assert!(matches!(declared, Err(RegistryError::IncompatibleModule { .. })));
        Ok(ModuleHandle::empty())
    };

    assert!(factory.load_module(Path::new("/opt/new.so"), &loader).is_err());
    assert!(!factory.item_exists("config", "too_new", true).expect("kind"));
}

#[test]
fn builtins_are_untouched_by_module_removal() {
    let factory = factory_with(&["config"]);
    let builtin = MockPlugin::new().shared();
    factory.add_plugin("config", "builtin", builtin.clone()).expect("add");

    let loader = |_path: &Path, _factory: &RegistryFactory| -> Result<ModuleHandle, RegistryError> {
        Err(RegistryError::plugin("init failed"))
    };
    assert!(factory.load_module(Path::new("/opt/bad.so"), &loader).is_err());
    assert!(factory.item_exists("config", "builtin", true).expect("kind"));
    assert_eq!(builtin.teardown_count(), 0);
}

#[test]
fn declare_outside_load_fails() {
    let factory = RegistryFactory::new();
    assert_eq!(
        factory.declare_module("x", "1.0.0", "0.0.1", "0.0.1"),
        Err(RegistryError::NoModuleLoad)
    );
}

#[test]
fn plugins_are_shared_not_copied() {
    let factory = factory_with(&["config"]);
    let plugin = MockPlugin::new().shared();
    factory.add_plugin("config", "fs", plugin.clone()).expect("add");
    let borrowed = factory.plugin("config", "fs").expect("lookup");
    borrowed.call(&Row::new()).expect("call");
    assert_eq!(plugin.call_count(), 1);
    assert_eq!(plugin.assigned_name().as_deref(), Some("fs"));
    drop(borrowed);
    assert_eq!(Arc::strong_count(&plugin), 2);
}
