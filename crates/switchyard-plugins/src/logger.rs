// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result loggers.
//!
//! Logger plugins receive a request with a `string` field holding one
//! serialized result line. Several loggers are usually addressed at once
//! through a multiplexed call.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use switchyard_core::{Plugin, PluginRequest, PluginResponse, RegistryError};

pub const FIELD_STRING: &str = "string";

fn line(request: &PluginRequest) -> Result<&str, RegistryError> {
    request
        .get(FIELD_STRING)
        .map(String::as_str)
        .ok_or_else(|| RegistryError::plugin("logger request has no string field"))
}

/// Emits each result line as a `tracing` event.
#[derive(Debug, Default)]
pub struct TracingLoggerPlugin {
    name: OnceLock<String>,
}

impl TracingLoggerPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for TracingLoggerPlugin {
    fn assign_name(&self, name: &str) {
        let _ = self.name.set(name.to_string());
    }

    fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        let line = line(request)?;
        let logger = self.name.get().map(String::as_str).unwrap_or_default();
        tracing::info!(logger, "{line}");
        Ok(PluginResponse::new())
    }
}

/// Appends each result line to a file.
#[derive(Debug)]
pub struct FileLoggerPlugin {
    path: PathBuf,
    write: Mutex<()>,
}

impl FileLoggerPlugin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<std::fs::File, RegistryError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                RegistryError::plugin(format!("cannot open {}: {e}", self.path.display()))
            })
    }
}

impl Plugin for FileLoggerPlugin {
    fn set_up(&self) -> Result<(), RegistryError> {
        self.open().map(drop)
    }

    fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        let line = line(request)?;
        let _guard = self.write.lock();
        let mut file = self.open()?;
        writeln!(file, "{line}").map_err(|e| {
            RegistryError::plugin(format!("cannot write {}: {e}", self.path.display()))
        })?;
        Ok(PluginResponse::new())
    }
}
