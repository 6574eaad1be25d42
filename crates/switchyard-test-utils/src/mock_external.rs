// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording transport standing in for an extension connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use switchyard_core::{ExternalCaller, PluginRequest, PluginResponse, RegistryError, RouteUuid};

/// One call the registry forwarded to an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedCall {
    pub uuid: RouteUuid,
    pub kind: String,
    pub name: String,
    pub request: PluginRequest,
}

/// External caller that records every forwarded call.
///
/// Clones share the same log, so a test can hand one clone to the factory
/// and keep another for assertions. Connections listed with
/// [`RecordingCaller::fail_for`] answer with an external error.
#[derive(Clone, Default)]
pub struct RecordingCaller {
    calls: Arc<Mutex<Vec<ForwardedCall>>>,
    failures: Arc<Mutex<BTreeMap<RouteUuid, (i32, String)>>>,
}

impl RecordingCaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `uuid` fail with `code` and `message`.
    pub fn fail_for(&self, uuid: RouteUuid, code: i32, message: impl Into<String>) {
        self.failures.lock().insert(uuid, (code, message.into()));
    }

    pub fn calls(&self) -> Vec<ForwardedCall> {
        self.calls.lock().clone()
    }
}

impl ExternalCaller for RecordingCaller {
    fn call(
        &self,
        uuid: RouteUuid,
        kind: &str,
        name: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse, RegistryError> {
        self.calls.lock().push(ForwardedCall {
            uuid,
            kind: kind.to_string(),
            name: name.to_string(),
            request: request.clone(),
        });
        tracing::debug!(%uuid, kind, name, "recorded forwarded call");

        if let Some((code, message)) = self.failures.lock().get(&uuid).cloned() {
            return Err(RegistryError::External { code, message });
        }

        let mut row = request.clone();
        row.insert("uuid".to_string(), uuid.to_string());
        row.insert("served_by".to_string(), format!("{kind}/{name}"));
        Ok(vec![row])
    }
}
