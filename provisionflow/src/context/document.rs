//! The path-addressed document threaded through every flow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::{JsonPath, PathSegment, ResultPath};
use crate::errors::FlowError;

/// A JSON document passed by value into each step and returned from it.
///
/// Child flows always receive a copy; nothing shares a mutable reference to
/// another step's document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    root: Value,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Creates an empty object document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps an existing value.
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Consumes the context and returns the underlying value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Resolves a required path.
    pub fn get(&self, path: &JsonPath) -> Result<&Value, FlowError> {
        path.resolve(&self.root)
            .ok_or_else(|| FlowError::path_not_found(path))
    }

    /// Resolves an optional path.
    #[must_use]
    pub fn lookup(&self, path: &JsonPath) -> Option<&Value> {
        path.resolve(&self.root)
    }

    /// Returns true if the path resolves, even to `null`.
    #[must_use]
    pub fn is_present(&self, path: &JsonPath) -> bool {
        self.lookup(path).is_some()
    }

    /// Resolves a required string.
    pub fn get_str(&self, path: &JsonPath) -> Result<&str, FlowError> {
        self.get(path)?.as_str().ok_or_else(|| {
            FlowError::InvalidInput(format!("expected a string at {path}"))
        })
    }

    /// Writes a value, creating intermediate objects as needed.
    pub fn set(&mut self, path: &ResultPath, value: Value) -> Result<(), FlowError> {
        let ResultPath::At(path) = path else {
            return Ok(());
        };
        if !path.is_writable() {
            return Err(FlowError::invalid_path(
                path.to_string(),
                "filter segments cannot be written through",
            ));
        }

        let mut current = &mut self.root;
        for segment in path.segments() {
            current = match segment {
                PathSegment::Field(name) => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    let Value::Object(map) = current else {
                        return Err(FlowError::InvalidInput(format!(
                            "cannot write {path}: '{name}' has a non-object parent"
                        )));
                    };
                    map.entry(name.clone()).or_insert(Value::Null)
                }
                PathSegment::Index(i) => current
                    .as_array_mut()
                    .and_then(|items| items.get_mut(*i))
                    .ok_or_else(|| FlowError::path_not_found(path))?,
                PathSegment::FindFirst(_) => {
                    return Err(FlowError::invalid_path(path.to_string(), "not writable"));
                }
            };
        }
        *current = value;
        Ok(())
    }

    /// Deep-merges `partial` into the node at `at`.
    ///
    /// Objects merge key by key; any other node is replaced.
    pub fn merge(&mut self, partial: Value, at: &ResultPath) -> Result<(), FlowError> {
        let ResultPath::At(path) = at else {
            return Ok(());
        };
        let merged = match self.lookup(path) {
            Some(existing) => {
                let mut existing = existing.clone();
                deep_merge(&mut existing, partial);
                existing
            }
            None => partial,
        };
        self.set(at, merged)
    }
}

impl From<Value> for ExecutionContext {
    fn from(root: Value) -> Self {
        Self::from_value(root)
    }
}

fn deep_merge(target: &mut Value, partial: Value) {
    match (target, partial) {
        (Value::Object(target), Value::Object(partial)) => {
            for (key, value) in partial {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, partial) => *target = partial,
    }
}
