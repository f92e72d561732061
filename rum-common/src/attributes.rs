use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of attributes, ordered by key.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// The value of a span, log or resource attribute.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Double(f64),
    /// A string.
    String(String),
}

impl AttributeValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Int(i) => i.fmt(f),
            Self::Double(d) => d.fmt(f),
            Self::String(s) => s.fmt(f),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json() {
        let mut attributes = Attributes::new();
        attributes.insert("a".to_owned(), true.into());
        attributes.insert("b".to_owned(), 3i64.into());
        attributes.insert("c".to_owned(), 1.5f64.into());
        attributes.insert("d".to_owned(), "x".into());

        let json = serde_json::to_string(&attributes).unwrap();
        assert_eq!(json, r#"{"a":true,"b":3,"c":1.5,"d":"x"}"#);

        let back: Attributes = serde_json::from_str(&json).unwrap();
        similar_asserts::assert_eq!(back, attributes);
    }
}
