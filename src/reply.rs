use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Failure, Result};

/// Named query parameters, bound to `$name` in scripts.
pub type Params = Map<String, Value>;

/// Row data keyed by relation name, as produced by an export and consumed by an import.
pub type Relations = BTreeMap<String, NamedRows>;

/// Column headers with their rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Seconds the engine spent on the query, when it reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub took: Option<f64>,
}

impl NamedRows {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            headers,
            rows,
            took: None,
        }
    }
}

impl std::fmt::Display for NamedRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

pub(crate) fn parse(raw: &str) -> Result<Value> {
    Ok(serde_json::from_str(raw)?)
}

/// Splits a reply on its `ok` flag. A reply without the flag counts as a failure.
pub(crate) fn check(reply: Value) -> Result<Value, Failure> {
    match reply.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(reply),
        _ => Err(Failure::from_reply(reply)),
    }
}

pub(crate) fn rows(reply: Value) -> Result<NamedRows> {
    Ok(serde_json::from_value(reply)?)
}

pub(crate) fn relations(mut reply: Value) -> Result<Relations> {
    Ok(serde_json::from_value(reply["data"].take())?)
}
