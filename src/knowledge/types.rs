//! Type definitions for the knowledge base.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// HTTP verbs a documented method may use.
pub const HTTP_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// One documented API operation.
///
/// Document producers write the HTTP verb under `"method"`; `"httpMethod"` is
/// accepted as well. Extra fields the producers add (`url`, `raw_content`, ...)
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Display name
    pub name: String,

    /// URL path, e.g. `/api/v1/door/open`
    pub endpoint: String,

    #[serde(rename = "method", alias = "httpMethod")]
    pub http_method: String,

    pub description: String,

    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Example request body, may be empty
    #[serde(default)]
    pub example: String,

    /// Example response, kept as text and never parsed
    #[serde(default)]
    pub response: String,
}

/// One input parameter of a [`MethodRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    /// Free-text type tag: "integer", "string", "boolean", "file", ...
    #[serde(rename = "type", default)]
    pub param_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,
}

impl MethodRecord {
    /// Check the record against the schema. Returns a list of problems, empty when valid.
    pub fn schema_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name is empty".to_string());
        }
        if !self.endpoint.starts_with('/') {
            problems.push(format!("endpoint '{}' is not an absolute path", self.endpoint));
        }
        if !HTTP_METHODS.contains(&self.http_method.as_str()) {
            problems.push(format!("unsupported HTTP method '{}'", self.http_method));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.parameters.len());
        for (idx, param) in self.parameters.iter().enumerate() {
            if param.name.trim().is_empty() {
                problems.push(format!("parameter #{} has no name", idx));
            } else if seen.contains(&param.name.as_str()) {
                problems.push(format!("duplicate parameter '{}'", param.name));
            } else {
                seen.push(&param.name);
            }
        }

        problems
    }

    /// Case-insensitive substring match on name, endpoint and description.
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.endpoint.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Ordered list of (method key, record) pairs. Order is the key order of the source document.
pub type MethodEntries = Vec<(String, MethodRecord)>;

/// Parse a JSON object mapping method keys to method records.
///
/// Key order is preserved. A record that cannot be mapped to the schema fails the
/// whole document with a `ParseError` naming the key.
pub fn parse_method_map(json: &str) -> Result<MethodEntries> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AppError::ParseError(format!("invalid JSON: {}", e)))?;
    entries_from_value(value)
}

/// Convert an already decoded JSON value into method entries.
pub fn entries_from_value(value: Value) -> Result<MethodEntries> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(AppError::ParseError(format!(
                "expected a JSON object of methods, got {}",
                json_type_name(&other)
            )))
        }
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, raw) in map {
        let record: MethodRecord = serde_json::from_value(raw)
            .map_err(|e| AppError::ParseError(format!("method '{}': {}", key, e)))?;
        entries.push((key, record));
    }

    Ok(entries)
}

/// Serialize entries back into an ordered JSON object.
pub fn entries_to_value(entries: &[(String, MethodRecord)]) -> Value {
    let mut map = Map::with_capacity(entries.len());
    for (key, record) in entries {
        // MethodRecord only holds strings, bools and vectors of them
        let value = serde_json::to_value(record).unwrap_or(Value::Null);
        map.insert(key.clone(), value);
    }
    Value::Object(map)
}

/// Hex SHA-256 over the ordered serialization of the entries.
///
/// Identical documents produce identical versions, which lets a refresh report
/// that nothing changed.
pub fn compute_source_version(entries: &[(String, MethodRecord)]) -> String {
    let mut hasher = Sha256::new();

    for (key, record) in entries {
        hasher.update(key.as_bytes());
        hasher.update(b"|");
        // Struct field order is fixed, so this serialization is canonical
        if let Ok(bytes) = serde_json::to_vec(record) {
            hasher.update(&bytes);
        }
        hasher.update(b"\n");
    }

    hex::encode(hasher.finalize())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
