/// An order-preserving dynamic JSON value for attribute bags.
///
/// Property sets, rule check values, and evaluator attribute maps carry
/// heterogeneous scalars. [`DynValue`] keeps object keys in a `BTreeMap` so
/// every serialisation of the same data produces identical bytes, which the
/// element store's idempotent-rewrite guarantee depends on.
///
/// The integer/float split preserves `150` vs `150.0` through round-trips;
/// numeric comparison in the rule evaluator goes through [`DynValue::as_f64`]
/// and treats both alike.
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A dynamic JSON value with deterministic object-key ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// JSON `null`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// IEEE 754 double-precision float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence of values.
    Array(Vec<DynValue>),
    /// String-keyed map, ordered by key.
    Object(BTreeMap<String, DynValue>),
}

/// A string-keyed map of dynamic values.
pub type DynMap = BTreeMap<String, DynValue>;

impl DynValue {
    /// Returns the string value if this is a `DynValue::String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            Self::Null
            | Self::Bool(_)
            | Self::Integer(_)
            | Self::Float(_)
            | Self::Array(_)
            | Self::Object(_) => None,
        }
    }

    /// Returns the numeric value of an integer or float variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Null | Self::Bool(_) | Self::String(_) | Self::Array(_) | Self::Object(_) => None,
        }
    }

    /// Returns the bool value if this is a `DynValue::Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Null
            | Self::Integer(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Array(_)
            | Self::Object(_) => None,
        }
    }

    /// Returns the inner array if this is a `DynValue::Array`.
    pub fn as_array(&self) -> Option<&[DynValue]> {
        match self {
            Self::Array(a) => Some(a.as_slice()),
            Self::Null
            | Self::Bool(_)
            | Self::Integer(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Object(_) => None,
        }
    }

    /// Returns the inner map if this is a `DynValue::Object`.
    pub fn as_object(&self) -> Option<&DynMap> {
        match self {
            Self::Object(m) => Some(m),
            Self::Null
            | Self::Bool(_)
            | Self::Integer(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Array(_) => None,
        }
    }

    /// Returns `true` if this is `DynValue::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for `null`, `""`, `[]`, and `{}`.
    ///
    /// This is the emptiness notion used by the `exists` check: a property
    /// that is present but empty does not satisfy an existence requirement.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::Array(a) => a.is_empty(),
            Self::Object(m) => m.is_empty(),
            Self::Bool(_) | Self::Integer(_) | Self::Float(_) => false,
        }
    }

    /// Index into an object by key.
    pub fn get(&self, key: &str) -> Option<&DynValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// A compact, bare-string rendering used inside result messages.
    ///
    /// Strings render without quotes so messages read naturally
    /// (`fire_rating = 2H`); everything else renders as JSON.
    pub fn display_bare(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Null
            | Self::Bool(_)
            | Self::Integer(_)
            | Self::Float(_)
            | Self::Array(_)
            | Self::Object(_) => self.to_string(),
        }
    }
}

impl fmt::Display for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("null"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for DynValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DynValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for DynValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for DynValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for DynValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<DynValue>> for DynValue {
    fn from(a: Vec<DynValue>) -> Self {
        Self::Array(a)
    }
}

impl From<DynMap> for DynValue {
    fn from(m: DynMap) -> Self {
        Self::Object(m)
    }
}

impl From<serde_json::Value> for DynValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Null
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(a) => Self::Array(a.into_iter().map(DynValue::from).collect()),
            serde_json::Value::Object(m) => {
                Self::Object(m.into_iter().map(|(k, v)| (k, DynValue::from(v))).collect())
            }
        }
    }
}

impl From<DynValue> for serde_json::Value {
    fn from(v: DynValue) -> Self {
        match v {
            DynValue::Null => serde_json::Value::Null,
            DynValue::Bool(b) => serde_json::Value::Bool(b),
            DynValue::Integer(i) => serde_json::Value::Number(i.into()),
            DynValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DynValue::String(s) => serde_json::Value::String(s),
            DynValue::Array(a) => {
                serde_json::Value::Array(a.into_iter().map(serde_json::Value::from).collect())
            }
            DynValue::Object(m) => {
                let map: serde_json::Map<String, serde_json::Value> = m
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect();
                serde_json::Value::Object(map)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serde impls
// ---------------------------------------------------------------------------

impl Serialize for DynValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(arr) => arr.serialize(serializer),
            Self::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DynValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DynValueVisitor)
    }
}

struct DynValueVisitor;

impl<'de> Visitor<'de> for DynValueVisitor {
    type Value = DynValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any valid JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DynValue, E> {
        Ok(DynValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DynValue, E> {
        Ok(DynValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DynValue, E> {
        match i64::try_from(v) {
            Ok(i) => Ok(DynValue::Integer(i)),
            Err(_) => Ok(DynValue::Float(v as f64)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DynValue, E> {
        Ok(DynValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DynValue, E> {
        Ok(DynValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<DynValue, E> {
        Ok(DynValue::String(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<DynValue, E> {
        Ok(DynValue::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<DynValue, E> {
        Ok(DynValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<DynValue, D::Error> {
        deserializer.deserialize_any(DynValueVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DynValue, A::Error> {
        let mut out = Vec::new();
        while let Some(item) = seq.next_element::<DynValue>()? {
            out.push(item);
        }
        Ok(DynValue::Array(out))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DynValue, A::Error> {
        let mut out = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, DynValue>()? {
            out.insert(key, value);
        }
        Ok(DynValue::Object(out))
    }
}
