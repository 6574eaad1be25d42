// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock plugin for deterministic registry tests.
//!
//! `MockPlugin` implements `Plugin` with queued responses and scripted
//! failures, and records every request and lifecycle event it sees.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use switchyard_core::{Plugin, PluginRequest, PluginResponse, RegistryError, RouteInfo, Row};

/// A plugin that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty, a single
/// row `{"plugin": <assigned name>}` is returned.
#[derive(Default)]
pub struct MockPlugin {
    name: OnceLock<String>,
    responses: Mutex<VecDeque<PluginResponse>>,
    requests: Mutex<Vec<PluginRequest>>,
    route: RouteInfo,
    fail_calls: Option<String>,
    fail_setup: Option<String>,
    setups: AtomicUsize,
    teardowns: AtomicUsize,
    configures: AtomicUsize,
}

impl MockPlugin {
    /// Create a mock plugin with an empty response queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock plugin whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_calls: Some(message.into()),
            ..Self::default()
        }
    }

    /// Create a mock plugin whose `set_up` fails with `message`.
    pub fn failing_setup(message: impl Into<String>) -> Self {
        Self {
            fail_setup: Some(message.into()),
            ..Self::default()
        }
    }

    /// Advertise `route` from `route_info`.
    pub fn with_route(mut self, route: RouteInfo) -> Self {
        self.route = route;
        self
    }

    /// Pre-load the response queue.
    pub fn with_responses(self, responses: Vec<PluginResponse>) -> Self {
        *self.responses.lock() = VecDeque::from(responses);
        self
    }

    /// Wrap in an `Arc` for registration, keeping a handle for assertions.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Add a response to the end of the queue.
    pub fn add_response(&self, response: PluginResponse) {
        self.responses.lock().push_back(response);
    }

    /// The first name a registry assigned, if registered.
    pub fn assigned_name(&self) -> Option<String> {
        self.name.get().cloned()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<PluginRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn setup_count(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn configure_count(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }
}

impl Plugin for MockPlugin {
    fn assign_name(&self, name: &str) {
        let _ = self.name.set(name.to_string());
    }

    fn set_up(&self) -> Result<(), RegistryError> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        match &self.fail_setup {
            Some(message) => Err(RegistryError::plugin(message.clone())),
            None => Ok(()),
        }
    }

    fn tear_down(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }

    fn configure(&self) {
        self.configures.fetch_add(1, Ordering::SeqCst);
    }

    fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        self.requests.lock().push(request.clone());
        if let Some(message) = &self.fail_calls {
            return Err(RegistryError::plugin(message.clone()));
        }

        let queued = self.responses.lock().pop_front();
        Ok(queued.unwrap_or_else(|| {
            let name = self.assigned_name().unwrap_or_default();
            vec![Row::from([("plugin".to_string(), name)])]
        }))
    }

    fn route_info(&self) -> RouteInfo {
        self.route.clone()
    }
}
