//! Record and schema types shared by every job

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One unit of external data with every value rendered as a string.
///
/// Field order is irrelevant here; the [`Schema`] decides column order when a record
/// is written out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(field, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style [`Record::set`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value of `field`, or the empty string when absent
    pub fn get_or_empty(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(field, value)` pairs in field-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Fixed output layout: ordered columns plus the column holding the unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    key: String,
}

impl Schema {
    /// Create a schema. The key column is added to the columns if missing.
    pub fn new<I, S>(columns: I, key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if !columns.contains(&key) {
            columns.insert(0, key.clone());
        }
        Self { columns, key }
    }

    /// Columns in output order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Name of the key column
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key value of `record` under this schema, if present and non-empty
    pub fn key_of<'a>(&self, record: &'a Record) -> Option<&'a str> {
        record.get(&self.key).filter(|k| !k.is_empty())
    }

    /// Render `record` as a row in column order; missing fields become empty strings
    pub fn row<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = &'a str> + 'a {
        self.columns.iter().map(|c| record.get_or_empty(c))
    }
}
