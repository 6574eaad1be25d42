// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config parsers: plugins that collect the top-level keys they care about
//! from every configuration source.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;
use switchyard_core::payload::set_response;
use switchyard_core::{Plugin, PluginRequest, PluginResponse, RegistryError, Row};

pub const ACTION_KEYS: &str = "keys";
pub const ACTION_GET: &str = "get";

/// Keeps the values of a fixed set of top-level keys, per source.
#[derive(Debug)]
pub struct KeyedParserPlugin {
    keys: Vec<String>,
    /// key -> source -> value
    data: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl KeyedParserPlugin {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let data = keys.iter().map(|k| (k.clone(), BTreeMap::new())).collect();
        Self {
            keys,
            data: RwLock::new(data),
        }
    }

    /// Top-level keys this parser collects.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Replaces everything `source` contributed with the keys found in `json`.
    pub fn update(&self, source: &str, json: &str) -> Result<(), RegistryError> {
        let tree: Value = serde_json::from_str(json).map_err(|e| {
            RegistryError::plugin(format!("config source {source} is not valid JSON: {e}"))
        })?;

        let mut data = self.data.write();
        for key in &self.keys {
            let by_source = data.entry(key.clone()).or_default();
            match tree.get(key) {
                Some(value) => {
                    by_source.insert(source.to_string(), value.clone());
                }
                None => {
                    by_source.remove(source);
                }
            }
        }
        Ok(())
    }

    /// Values of `key`, per source.
    pub fn data(&self, key: &str) -> BTreeMap<String, Value> {
        self.data.read().get(key).cloned().unwrap_or_default()
    }

    /// Clears every category.
    pub fn reset(&self) {
        for by_source in self.data.write().values_mut() {
            by_source.clear();
        }
    }
}

impl Plugin for KeyedParserPlugin {
    fn call(&self, request: &PluginRequest) -> Result<PluginResponse, RegistryError> {
        match request.get("action").map(String::as_str) {
            Some(ACTION_KEYS) => Ok(self
                .keys
                .iter()
                .map(|k| Row::from([("key".to_string(), k.clone())]))
                .collect()),
            Some(ACTION_GET) => {
                let key = request
                    .get("key")
                    .ok_or_else(|| RegistryError::plugin("get requires key"))?;
                let mut response = PluginResponse::new();
                for (source, value) in self.data(key) {
                    set_response(&source, &value, &mut response);
                }
                Ok(response)
            }
            other => Err(RegistryError::plugin(format!(
                "Config parser action unknown: {}",
                other.unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::payload::request;

    #[test]
    fn update_collects_only_keys_of_interest() {
        let parser = KeyedParserPlugin::new(["options"]);
        parser
            .update("main", r#"{"options": {"verbose": true}, "schedule": {}}"#)
            .expect("valid JSON");

        let options = parser.data("options");
        assert_eq!(options["main"]["verbose"], Value::Bool(true));
        assert!(parser.data("schedule").is_empty());
    }

    #[test]
    fn update_replaces_a_source_contribution() {
        let parser = KeyedParserPlugin::new(["options"]);
        parser.update("main", r#"{"options": {"a": 1}}"#).expect("first");
        parser.update("extra", r#"{"options": {"b": 2}}"#).expect("second");
        parser.update("main", r#"{}"#).expect("main drops options");

        let options = parser.data("options");
        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["extra"]);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let parser = KeyedParserPlugin::new(["options"]);
        assert!(parser.update("main", "{not json").is_err());
    }

    #[test]
    fn reset_clears_every_category() {
        let parser = KeyedParserPlugin::new(["options", "packs"]);
        parser
            .update("main", r#"{"options": {}, "packs": {"p": "p.json"}}"#)
            .expect("valid");
        parser.reset();
        assert!(parser.data("options").is_empty());
        assert!(parser.data("packs").is_empty());
        assert_eq!(parser.keys(), ["options".to_string(), "packs".to_string()]);
    }

    #[test]
    fn call_lists_keys_and_values() {
        let parser = KeyedParserPlugin::new(["options"]);
        parser.update("main", r#"{"options": {"a": 1}}"#).expect("valid");

        let keys = parser.call(&request([("action", ACTION_KEYS)])).expect("keys");
        assert_eq!(keys, vec![request([("key", "options")])]);

        let values = parser
            .call(&request([("action", ACTION_GET), ("key", "options")]))
            .expect("get");
        assert_eq!(values, vec![request([("main", r#"{"a":1}"#)])]);

        assert!(parser.call(&request([("action", "nope")])).is_err());
    }
}
