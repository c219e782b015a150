//! Attribute records - the unit the engine reads and writes

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered mapping from attribute name to tri-state value
///
/// Records are plain values: plans produced by the caller, states produced by
/// the engine. Absent attributes read as [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeRecord {
    values: BTreeMap<String, Value>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value (`Null` when not present)
    pub fn get(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Borrow an attribute value without cloning
    pub fn value(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values.get(name).unwrap_or(NULL)
    }

    /// Get a known string attribute
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Set an attribute value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Whether both records hold the same value for `name`
    pub fn equals(&self, other: &Self, name: &str) -> bool {
        self.value(name) == other.value(name)
    }

    /// Copy of this record restricted to `names`
    pub fn subset<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self::new();
        for name in names {
            out.set(name, self.get(name));
        }
        out
    }

    /// Attribute names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether any attribute is still unknown
    pub fn has_unknown(&self) -> bool {
        self.values.values().any(Value::is_unknown)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AttributeRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_reads_as_null() {
        let record = AttributeRecord::new();
        assert_eq!(record.get("name"), Value::Null);
        assert!(record.value("name").is_null());
    }

    #[test]
    fn test_equals_is_tri_state_aware() {
        let a = AttributeRecord::new().with("role", "admin").with("id", Value::Unknown);
        let b = AttributeRecord::new().with("role", "admin").with("id", Value::Null);

        assert!(a.equals(&b, "role"));
        assert!(!a.equals(&b, "id"));
        // Absent and explicit null are the same value
        assert!(b.equals(&AttributeRecord::new(), "id"));
    }

    #[test]
    fn test_subset() {
        let record = AttributeRecord::new()
            .with("id", "p1")
            .with("name", "Infra")
            .with("type", "team");
        let subset = record.subset(["name"]);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset.get_str("name"), Some("Infra"));
    }

    #[test]
    fn test_serde_transparent() {
        let record = AttributeRecord::new().with("id", "p1").with("type", Value::Null);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":"p1","type":null}"#);

        let back: AttributeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unknown_blocks_serialization() {
        let record = AttributeRecord::new().with("id", Value::Unknown);
        assert!(record.has_unknown());
        assert!(serde_json::to_string(&record).is_err());
    }
}
