// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between flat call payloads and JSON trees.
//!
//! Plugins that work with structured data pack response rows into a
//! `serde_json::Value` and flatten structures back into string payloads.
//! A serialization failure degrades a single entry to an empty string; it
//! never aborts the rest of the payload.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{PluginRequest, PluginResponse, Row};

/// Packs every row of `response` as a JSON object under `key`.
///
/// The result has the shape `{ key: [ {col: value, ...}, ... ] }`.
pub fn get_response(key: &str, response: &PluginResponse) -> Value {
    let children: Vec<Value> = response.iter().map(row_to_value).collect();
    let mut tree = Map::new();
    tree.insert(key.to_string(), Value::Array(children));
    Value::Object(tree)
}

/// Converts one row into a JSON object of string values.
pub fn row_to_value(row: &Row) -> Value {
    Value::Object(
        row.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Serializes `value` to compact JSON and appends it as `{key: json}`.
///
/// If serialization fails the entry is still appended, with an empty value.
pub fn set_response<T: Serialize + ?Sized>(key: &str, value: &T, response: &mut PluginResponse) {
    let serialized = serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "plugin response could not be serialized");
        String::new()
    });
    response.push(Row::from([(key.to_string(), serialized)]));
}

/// Flattens each entry into its own `{key: json}` row.
///
/// Entries that fail to serialize become empty fields; the remaining entries
/// are still packed.
pub fn flatten_entries<T: Serialize>(key: &str, entries: &[T]) -> PluginResponse {
    let mut response = PluginResponse::with_capacity(entries.len());
    for entry in entries {
        set_response(key, entry, &mut response);
    }
    response
}

/// Builds a request from `(key, value)` pairs.
pub fn request<K, V, I>(pairs: I) -> PluginRequest
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
