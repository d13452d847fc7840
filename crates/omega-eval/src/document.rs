//! Document model evaluated by rules.
//!
//! A [`Value`] is a closed sum type over the shapes a structured record can
//! take. Documents usually arrive as JSON and are converted with
//! `Value::from(serde_json::Value)`; native timestamps can be inserted as
//! [`Value::Date`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeZone, Utc};

/// A structured document, or any node inside one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<FixedOffset>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Look up a child by key.
    ///
    /// Maps are indexed by key and arrays by a decimal index, so `items.0`
    /// addresses the first element of `items`. Scalars have no children.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Follow `path` from this node. Any missing step yields `None`.
    pub fn descend<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        path.iter()
            .try_fold(self, |node, segment| node.get(segment.as_ref()))
    }

    /// Whether `phrase` occurs in the text of any map key or scalar leaf.
    ///
    /// The walk is depth-first and iterative, so deeply nested documents do
    /// not grow the call stack. Matching is case-sensitive.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        if phrase.is_empty() {
            return true;
        }

        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Value::Array(items) => stack.extend(items.iter().rev()),
                Value::Map(map) => {
                    if map.keys().any(|k| k.contains(phrase)) {
                        return true;
                    }
                    stack.extend(map.values().rev());
                }
                Value::String(s) => {
                    if s.contains(phrase) {
                        return true;
                    }
                }
                scalar => {
                    if scalar.to_string().contains(phrase) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

/// Containers are torn down with an explicit stack so deeply nested
/// documents do not exhaust the thread stack.
impl Drop for Value {
    fn drop(&mut self) {
        let mut stack = match self {
            Value::Array(items) if !items.is_empty() => std::mem::take(items),
            Value::Map(map) if !map.is_empty() => std::mem::take(map).into_values().collect(),
            _ => return,
        };
        while let Some(mut node) = stack.pop() {
            match &mut node {
                Value::Array(items) => stack.append(items),
                Value::Map(map) => stack.extend(std::mem::take(map).into_values()),
                _ => {}
            }
        }
    }
}

/// Canonical text of a node. Scalars print bare; containers print as compact
/// JSON-like text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => f.write_str(
                &d.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        Value::from(value.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(d: DateTime<Tz>) -> Self {
        Value::Date(d.fixed_offset())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
