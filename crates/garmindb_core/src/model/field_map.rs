//! Field maps and persisted records.
//!
//! # Invariants
//! - Keys are unique; insertion replaces the previous value.
//! - Iteration order is the lexical key order.
//! - Unknown keys are accepted here and dropped by repository filtering.

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use std::collections::btree_map::{self, BTreeMap};

/// Identifier generated by the store for each row.
pub type RecordId = i64;

/// Text encoding of timestamp columns.
///
/// Fixed width, so lexical order matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Encodes a timestamp the way timestamp columns store it.
pub fn timestamp_value(timestamp: NaiveDateTime) -> Value {
    Value::Text(timestamp.format(TIMESTAMP_FORMAT).to_string())
}

/// Caller-supplied set of named values describing one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: BTreeMap<String, Value>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts `value`, returning the value previously stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of entries whose value is not SQL `NULL`.
    pub fn non_null_count(&self) -> usize {
        self.fields
            .values()
            .filter(|value| !matches!(value, Value::Null))
            .count()
    }
}

impl<K: Into<String>, const N: usize> From<[(K, Value); N]> for FieldMap {
    fn from(entries: [(K, Value); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// One persisted row: the generated identifier plus every declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: FieldMap,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Text value of `column`, `None` when absent, null or not text.
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.fields.get(column) {
            Some(Value::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Integer value of `column`, `None` when absent, null or not an integer.
    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.fields.get(column) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value of `column`; integers are widened.
    pub fn real(&self, column: &str) -> Option<f64> {
        match self.fields.get(column) {
            Some(Value::Real(value)) => Some(*value),
            Some(Value::Integer(value)) => Some(*value as f64),
            _ => None,
        }
    }
}
