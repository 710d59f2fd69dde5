//! Typed values held by property nodes.

use serde::{Deserialize, Serialize};

/// The value stored on a single property node.
///
/// Remote values arrive as JSON scalars. Anything that is not a scalar is kept as
/// its JSON text so that nothing is silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    /// No value (JSON `null`, or a node that was only created as an ancestor).
    #[default]
    None,
    Bool(bool),
    Number(f64),
    String(String),
}

impl PropValue {
    /// Convert a JSON value received on the wire.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::None, Self::Number),
            serde_json::Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Numeric view of the value. Strings are parsed leniently, booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view of the value, accepting the property-tree spellings of true/false.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::None => None,
            Self::Bool(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            Self::String(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" | "" => Some(false),
                _ => None,
            },
        }
    }

    /// Text rendering of the value (numbers without a trailing `.0`).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
