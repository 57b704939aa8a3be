//! String-keyed records.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// An ordered map of field name to [`Value`].
///
/// Used for local records, remote payloads and mapper output alike.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(field, value)` pairs. Later pairs win.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Inserts a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Removes a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if the field is present (even when null).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns true if the field is present and truthy.
    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some_and(Value::is_truthy)
    }

    /// Returns the text value of a field, if it is text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    /// Returns the integer value of a field (numeric text accepted).
    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_integer)
    }

    /// Returns the float value of a field (integers and numeric text accepted).
    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_float)
    }

    /// Returns a field that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingField`] when absent.
    pub fn require(&self, field: &str) -> CodecResult<&Value> {
        self.get(field).ok_or_else(|| CodecError::missing_field(field))
    }

    /// Returns an integer field that must be present.
    ///
    /// # Errors
    ///
    /// Returns an error when absent or not an integer.
    pub fn require_integer(&self, field: &str) -> CodecResult<i64> {
        let value = self.require(field)?;
        value.as_integer().ok_or(CodecError::UnexpectedType {
            field: field.to_string(),
            expected: "integer",
            found: value.type_name(),
        })
    }

    /// Merges `other` into this record. Keys of `other` overwrite.
    pub fn merge(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }

    /// Splits the record in two: the fields whose name satisfies `pred`, and
    /// the rest.
    pub fn partition(self, pred: impl Fn(&str) -> bool) -> (Record, Record) {
        let (matching, rest): (BTreeMap<_, _>, BTreeMap<_, _>) =
            self.fields.into_iter().partition(|(k, _)| pred(k));
        (Record { fields: matching }, Record { fields: rest })
    }

    /// Keeps only the fields whose name satisfies `pred`.
    pub fn retain(&mut self, pred: impl Fn(&str) -> bool) {
        self.fields.retain(|k, _| pred(k));
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterates over `(field, value)` pairs in field order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Converts the record into a map [`Value`].
    pub fn into_value(self) -> Value {
        Value::Map(self.fields)
    }

    /// Builds a record from a map [`Value`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a map.
    pub fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Map(fields) => Ok(Self { fields }),
            other => Err(CodecError::UnexpectedType {
                field: "<record>".to_string(),
                expected: "map",
                found: other.type_name(),
            }),
        }
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_last_write_wins() {
        let mut a = Record::new().with("name", "A").with("city", "Lausanne");
        let b = Record::new().with("name", "B");
        a.merge(b);

        assert_eq!(a.text("name"), Some("B"));
        assert_eq!(a.text("city"), Some("Lausanne"));
    }

    #[test]
    fn partition_splits_by_name() {
        let record = Record::new()
            .with("name", "Shoes")
            .with("product_type", "simple")
            .with("created_at", "2013-01-01");

        let (binding, wrapped) =
            record.partition(|f| matches!(f, "product_type" | "created_at"));

        assert_eq!(binding.len(), 2);
        assert_eq!(wrapped.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn require_reports_missing_and_mistyped_fields() {
        let record = Record::new().with("level", "x");

        assert_eq!(
            record.require("name"),
            Err(CodecError::missing_field("name"))
        );
        assert!(matches!(
            record.require_integer("level"),
            Err(CodecError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn is_set_uses_truthiness() {
        let record = Record::new()
            .with("email", "")
            .with("zip", "1000")
            .with("phone", Value::Null);

        assert!(!record.is_set("email"));
        assert!(record.is_set("zip"));
        assert!(!record.is_set("phone"));
        assert!(!record.is_set("missing"));
    }

    #[test]
    fn value_conversion() {
        let record = Record::new().with("a", 1i64);
        let value = record.clone().into_value();
        assert_eq!(Record::from_value(value).unwrap(), record);
        assert!(Record::from_value(Value::Integer(1)).is_err());
    }
}
