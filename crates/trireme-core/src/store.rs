//! The per-replica key-value map.

use crate::error::{CoreError, Result};
use crate::number::Number;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from string keys to numbers.
///
/// Keys are created on first write. Reading a key that was never written
/// yields `None`, never an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValueMap {
    entries: BTreeMap<String, Number>,
}

impl KeyValueMap {
    pub fn new() -> Self {
        KeyValueMap {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Number)>) -> Self {
        KeyValueMap {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Build a map from a JSON object, rejecting non-numeric values.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| CoreError::NonNumeric {
            key: String::new(),
            found: value.to_string(),
        })?;

        let mut map = KeyValueMap::new();
        for (key, raw) in object {
            map.insert(key.clone(), Number::from_json(key, raw)?);
        }
        Ok(map)
    }

    pub fn get(&self, key: &str) -> Option<Number> {
        self.entries.get(key).copied()
    }

    /// Store a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Number) -> Option<Number> {
        self.entries.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Number)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// An ordered copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<String, Number> {
        self.entries.clone()
    }
}
