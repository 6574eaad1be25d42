// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration source plugins.
//!
//! A `config` plugin answers two actions: `genConfig` returns one row
//! mapping each source name to its raw content, and `genPack` resolves a
//! named pack to its content.

use std::path::{Path, PathBuf};

use switchyard_core::{Plugin, PluginRequest, PluginResponse, RegistryError, Row};

pub const ACTION_GEN_CONFIG: &str = "genConfig";
pub const ACTION_GEN_PACK: &str = "genPack";

/// Reads configuration from one JSON file on disk.
#[derive(Debug, Clone)]
pub struct FilesystemConfigPlugin {
    path: PathBuf,
}

impl FilesystemConfigPlugin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<String, RegistryError> {
        std::fs::read_to_string(path).map_err(|e| {
            RegistryError::plugin(format!("cannot read config source {}: {e}", path.display()))
        })
    }

    fn gen_config(&self) -> Result<PluginResponse, RegistryError> {
        let content = Self::read(&self.path)?;
        tracing::debug!(path = %self.path.display(), bytes = content.len(), "generated config");
        Ok(vec![Row::from([(self.path.display().to_string(), content)])])
    }

    fn gen_pack(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        let (Some(name), Some(value)) = (request.get("name"), request.get("value")) else {
            return Err(RegistryError::plugin("genPack requires name and value"));
        };

        // Relative pack paths resolve next to the config source.
        let pack_path = match self.path.parent() {
            Some(dir) if Path::new(value).is_relative() => dir.join(value),
            _ => PathBuf::from(value),
        };
        let content = Self::read(&pack_path)?;
        Ok(vec![Row::from([(name.clone(), content)])])
    }
}

impl Plugin for FilesystemConfigPlugin {
    fn set_up(&self) -> Result<(), RegistryError> {
        if !self.path.is_file() {
            return Err(RegistryError::plugin(format!(
                "config source {} does not exist",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        let action = request.get("action").map(String::as_str).unwrap_or_default();
        match action {
            ACTION_GEN_CONFIG => self.gen_config(),
            ACTION_GEN_PACK => self.gen_pack(request),
            other => Err(RegistryError::plugin(format!(
                "Config plugin action unknown: {other}"
            ))),
        }
    }
}
