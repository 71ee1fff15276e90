//! Per-run correlation context.

use crate::error::ContextError;
use crate::ids::Identifier;
use serde_json::Value;
use std::collections::HashMap;

/// Write-once key/value store threading values from one step into later ones.
///
/// A context lives for exactly one workflow run. Values are JSON scalars (or
/// whatever a step extracted from a response body).
#[derive(Debug, Default, Clone)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Fails if `key` was already written in this run.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ContextError> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(ContextError::DuplicateKey(key));
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    pub fn set_id(&mut self, key: impl Into<String>, id: Identifier) -> Result<(), ContextError> {
        self.set(key, Value::String(id.into_string()))
    }

    pub fn get(&self, key: &str) -> Result<&Value, ContextError> {
        self.values
            .get(key)
            .ok_or_else(|| ContextError::MissingKey(key.to_string()))
    }

    /// String form of a value: strings verbatim, everything else as JSON text.
    pub fn get_str(&self, key: &str) -> Result<String, ContextError> {
        Ok(match self.get(key)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
