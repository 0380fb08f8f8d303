use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ValidationError;
use crate::value::Value;

/// Name of the identifier column every table starts with.
pub const ID_COLUMN: &str = "id";

/// One row: field names mapped to values, in insertion order.
///
/// Equality compares the fields as a map, so two records holding the same
/// fields in a different order are equal.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Add a named value
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Build a record from untyped JSON. Anything but an object of scalars
    /// is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        let serde_json::Value::Object(object) = value else {
            return Err(ValidationError::NotRecordShaped);
        };
        let mut record = Self::with_capacity(object.len());
        for (name, value) in object {
            let value = Value::from_json(&name, value)?;
            record.fields.insert(name, value);
        }
        Ok(record)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn id(&self) -> Option<&Value> {
        self.fields.get(ID_COLUMN)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
