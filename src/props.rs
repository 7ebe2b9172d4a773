//! Prop values carried by widget snapshots and rendered nodes
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::sync::Arc;

/// Props mapping as returned by `Widget::render_props`. Keeps insertion order;
/// fingerprinting is order-independent.
pub type Props = IndexMap<String, PropValue>;

/// Opaque prop value (style objects, clip paths, edge insets...).
///
/// Objects that can describe themselves as an ordered tuple of plain values
/// should implement [`PropObject::canonical_tuple`]. Objects that don't are
/// compared through their `Display` form, which is lossy and logged.
pub trait PropObject: fmt::Debug + fmt::Display + Send + Sync {
    fn canonical_tuple(&self) -> Option<Vec<PropValue>> {
        None
    }

    /// JSON form placed in INSERT/UPDATE patches.
    fn to_json(&self) -> serde_json::Value {
        match self.canonical_tuple() {
            Some(items) => serde_json::Value::Array(items.iter().map(PropValue::to_json).collect()),
            None => serde_json::Value::String(self.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropValue>),
    Map(IndexMap<String, PropValue>),
    Object(Arc<dyn PropObject>),
}

impl PropValue {
    pub fn object(obj: impl PropObject + 'static) -> Self {
        PropValue::Object(Arc::new(obj))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(i) => Some(*i as f64),
            PropValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, PropValue>> {
        match self {
            PropValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropValue::Null => serde_json::Value::Null,
            PropValue::Bool(b) => serde_json::Value::Bool(*b),
            PropValue::Int(i) => serde_json::Value::from(*i),
            // NaN and infinities have no JSON form
            PropValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropValue::Str(s) => serde_json::Value::String(s.clone()),
            PropValue::List(items) => {
                serde_json::Value::Array(items.iter().map(PropValue::to_json).collect())
            }
            PropValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            PropValue::Object(obj) => obj.to_json(),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropValue::Null,
            serde_json::Value::Bool(b) => PropValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PropValue::Int(i),
                None => PropValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => PropValue::Str(s),
            serde_json::Value::Array(items) => {
                PropValue::List(items.into_iter().map(PropValue::from_json).collect())
            }
            serde_json::Value::Object(map) => PropValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PropValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Semantic equality: two values are equal when their canonical forms are.
impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        crate::fingerprint::canonical_value(self) == crate::fingerprint::canonical_value(other)
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Null => serializer.serialize_unit(),
            PropValue::Bool(b) => serializer.serialize_bool(*b),
            PropValue::Int(i) => serializer.serialize_i64(*i),
            PropValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            PropValue::Float(_) => serializer.serialize_unit(),
            PropValue::Str(s) => serializer.serialize_str(s),
            PropValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PropValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            PropValue::Object(obj) => obj.to_json().serialize(serializer),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<i32> for PropValue {
    fn from(i: i32) -> Self {
        PropValue::Int(i64::from(i))
    }
}

impl From<u32> for PropValue {
    fn from(i: u32) -> Self {
        PropValue::Int(i64::from(i))
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        PropValue::Float(f)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(items: Vec<PropValue>) -> Self {
        PropValue::List(items)
    }
}

impl From<IndexMap<String, PropValue>> for PropValue {
    fn from(map: IndexMap<String, PropValue>) -> Self {
        PropValue::Map(map)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PropValue::Null)
    }
}
