//! Scalar values held by the variable store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The last known value of a reactive variable.
///
/// Directives only ever produce strings; booleans and null come from
/// accessor calls and from keys that have never been set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Str(String),
}

impl Value {
    /// Whether this is the unset value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether writing this value to a checkbox or radio checks it.
    ///
    /// `true`, `"true"` and `"1"` check; everything else unchecks.
    pub fn is_checked(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Str(s) => s == "true" || s == "1",
            Value::Null => false,
        }
    }
}

impl fmt::Display for Value {
    /// Null renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_values() {
        assert!(Value::from(true).is_checked());
        assert!(Value::from("true").is_checked());
        assert!(Value::from("1").is_checked());
        assert!(!Value::from("on").is_checked());
        assert!(!Value::Null.is_checked());
    }

    #[test]
    fn display_and_conversions() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(false).to_string(), "false");
        assert_eq!(Value::from(Some("x")).as_str(), Some("x"));
        assert!(Value::from(None::<String>).is_null());
    }

    #[test]
    fn serializes_as_plain_json_scalars() {
        let values = vec![Value::Null, Value::from(true), Value::from("on")];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,"on"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
