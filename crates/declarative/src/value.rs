//! Tri-state attribute values
//!
//! Declarative configuration distinguishes three situations for every
//! attribute: not set, not yet known (computed by the remote side), and known.

use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a single attribute
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// Attribute is unset
    #[default]
    Null,
    /// Attribute will be known after the remote side assigns it
    Unknown,
    /// Attribute has a concrete value
    Known(serde_json::Value),
}

impl Value {
    /// Build a known string value
    pub fn known_str(value: impl Into<String>) -> Self {
        Self::Known(serde_json::Value::String(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Borrow the inner string, if this is a known string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Known(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow the inner JSON value, if known
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Render the value as an identifier string
    ///
    /// Numbers are accepted because some list endpoints return numeric ids.
    pub fn as_identifier(&self) -> Option<String> {
        match self {
            Self::Known(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Known(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Unknown => write!(f, "(known after apply)"),
            Self::Known(serde_json::Value::String(s)) => write!(f, "\"{s}\""),
            Self::Known(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::known_str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::known_str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Known(serde_json::Value::Bool(value))
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            other => Self::Known(other),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Known(v) => v.serialize(serializer),
            Self::Unknown => Err(S::Error::custom(
                "unknown attribute values cannot be persisted",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
