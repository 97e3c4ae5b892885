//! The heterogeneous value tree.
//!
//! `Value` mirrors the JSON data model plus the three extensions the
//! notation needs: byte strings, RFC3339 timestamps, and maps with
//! non-string keys. String-keyed maps (`MapStr`) are the default; a map is
//! promoted to `MapAny` the first time a non-string key is inserted.
//! Iteration order of both map flavors is unspecified.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A structured data value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// NaN and infinity are never produced by the parser.
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Seq(Vec<Value>),
    /// String-keyed map; the common case.
    MapStr(HashMap<String, Value>),
    /// Map with at least one non-string key.
    MapAny(HashMap<MapKey, Value>),
}

/// A hashable scalar usable as a `MapAny` key.
///
/// Floats hash by bit pattern; negative zero is normalized on construction
/// so `0.0` and `-0.0` land in the same bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum MapKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MapKey::Null => {}
            MapKey::Bool(b) => b.hash(state),
            MapKey::Int(i) => i.hash(state),
            MapKey::Float(f) => f.to_bits().hash(state),
            MapKey::String(s) => s.hash(state),
            MapKey::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl MapKey {
    /// Convert a scalar value into a key. Returns `None` for containers
    /// and byte strings, which are not hashable keys.
    pub fn from_value(value: &Value) -> Option<MapKey> {
        Some(match value {
            Value::Null => MapKey::Null,
            Value::Bool(b) => MapKey::Bool(*b),
            Value::Int(i) => MapKey::Int(*i),
            Value::Float(f) => MapKey::Float(if *f == 0.0 { 0.0 } else { *f }),
            Value::String(s) => MapKey::String(s.clone()),
            Value::Timestamp(ts) => MapKey::Timestamp(*ts),
            Value::Bytes(_) | Value::Seq(_) | Value::MapStr(_) | Value::MapAny(_) => return None,
        })
    }

    pub fn into_value(self) -> Value {
        match self {
            MapKey::Null => Value::Null,
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::Int(i) => Value::Int(i),
            MapKey::Float(f) => Value::Float(f),
            MapKey::String(s) => Value::String(s),
            MapKey::Timestamp(ts) => Value::Timestamp(ts),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MapKey::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    /// The string form used when a `MapAny` is rendered through a
    /// string-keyed boundary such as JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Null => f.write_str("null"),
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Float(n) => write!(f, "{n}"),
            MapKey::String(s) => f.write_str(s),
            MapKey::Timestamp(ts) => {
                f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl Value {
    /// True for either map flavor.
    pub fn is_map(&self) -> bool {
        matches!(self, Value::MapStr(_) | Value::MapAny(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Value::Seq(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for scalars eligible as `MapAny` keys.
    pub fn is_hashable(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::String(_)
                | Value::Timestamp(_)
        )
    }

    /// Truthiness for predicate filters: null and empty containers are
    /// false, zero numbers are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Timestamp(_) => true,
            Value::Seq(s) => !s.is_empty(),
            Value::MapStr(m) => !m.is_empty(),
            Value::MapAny(m) => !m.is_empty(),
        }
    }

    /// A short name for the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Seq(_) => "seq",
            Value::MapStr(_) | Value::MapAny(_) => "map",
        }
    }

    /// Recursively convert any `MapAny` into a `MapStr` by stringifying
    /// keys. Used for string-keyed output boundaries (JSON, and CBOR when
    /// `force_string_keys` is set).
    pub fn into_string_keys(self) -> Value {
        match self {
            Value::Seq(items) => {
                Value::Seq(items.into_iter().map(Value::into_string_keys).collect())
            }
            Value::MapStr(m) => Value::MapStr(
                m.into_iter()
                    .map(|(k, v)| (k, v.into_string_keys()))
                    .collect(),
            ),
            Value::MapAny(m) => Value::MapStr(
                m.into_iter()
                    .map(|(k, v)| (k.to_string(), v.into_string_keys()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Decode a CBOR value. Maps always land as `MapAny` since CBOR keys
    /// are arbitrary; apply [`Value::into_string_keys`] afterwards when
    /// string keys are forced. Unhashable keys are stringified from their
    /// debug form rather than dropped.
    pub fn from_cbor(value: ciborium::Value) -> Value {
        use ciborium::Value as Cbor;
        match value {
            Cbor::Null => Value::Null,
            Cbor::Bool(b) => Value::Bool(b),
            Cbor::Integer(i) => match i64::try_from(i) {
                Ok(n) => Value::Int(n),
                Err(_) => Value::Float(i128::from(i) as f64),
            },
            Cbor::Float(f) => Value::Float(f),
            Cbor::Text(s) => Value::String(s),
            Cbor::Bytes(b) => Value::Bytes(b),
            Cbor::Array(items) => Value::Seq(items.into_iter().map(Value::from_cbor).collect()),
            Cbor::Map(entries) => Value::MapAny(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        let key_value = Value::from_cbor(k);
                        let key = MapKey::from_value(&key_value)
                            .unwrap_or_else(|| MapKey::String(format!("{key_value:?}")));
                        (key, Value::from_cbor(v))
                    })
                    .collect(),
            ),
            Cbor::Tag(tag, inner) => {
                let inner = Value::from_cbor(*inner);
                // Standard datetime tag: text content parses as RFC3339.
                if tag == 0 {
                    if let Value::String(s) = &inner {
                        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                            return Value::Timestamp(ts.with_timezone(&Utc));
                        }
                    }
                }
                inner
            }
            _ => Value::Null,
        }
    }

    /// Encode into a CBOR value, preserving byte strings and map keys.
    pub fn to_cbor(&self) -> ciborium::Value {
        use ciborium::Value as Cbor;
        match self {
            Value::Null => Cbor::Null,
            Value::Bool(b) => Cbor::Bool(*b),
            Value::Int(i) => Cbor::Integer((*i).into()),
            Value::Float(f) => Cbor::Float(*f),
            Value::String(s) => Cbor::Text(s.clone()),
            Value::Bytes(b) => Cbor::Bytes(b.clone()),
            Value::Timestamp(ts) => Cbor::Tag(
                0,
                Box::new(Cbor::Text(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
            ),
            Value::Seq(items) => Cbor::Array(items.iter().map(Value::to_cbor).collect()),
            Value::MapStr(m) => Cbor::Map(
                m.iter()
                    .map(|(k, v)| (Cbor::Text(k.clone()), v.to_cbor()))
                    .collect(),
            ),
            Value::MapAny(m) => Cbor::Map(
                m.iter()
                    .map(|(k, v)| (k.clone().into_value().to_cbor(), v.to_cbor()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Seq(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::MapStr(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    /// The JSON view: bytes render as standard base64, timestamps as
    /// RFC3339, and `MapAny` keys are stringified.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
            Value::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::MapStr(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::MapAny(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(&k.to_string(), v)?;
                }
                map.end()
            }
        }
    }
}

/// Build a `MapStr` from string/value pairs; handy in tests and callers.
pub fn map_str<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::MapStr(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_map_order() {
        let a = map_str([("x", Value::Int(1)), ("y", Value::Int(2))]);
        let b = map_str([("y", Value::Int(2)), ("x", Value::Int(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn map_flavors_are_distinct() {
        let s = map_str([("x", Value::Int(1))]);
        let a = Value::MapAny(HashMap::from([(MapKey::String("x".into()), Value::Int(1))]));
        assert_ne!(s, a);
    }

    #[test]
    fn string_key_conversion() {
        let any = Value::MapAny(HashMap::from([
            (MapKey::Int(1), Value::String("a".into())),
            (MapKey::Bool(true), Value::Int(2)),
        ]));
        let converted = any.into_string_keys();
        assert_eq!(
            converted,
            map_str([("1", Value::String("a".into())), ("true", Value::Int(2))])
        );
    }

    #[test]
    fn json_view() {
        let v = map_str([
            ("b", Value::Bytes(vec![0xc2])),
            ("n", Value::Null),
            ("s", Value::Seq(vec![Value::Int(1), Value::Float(1.5)])),
        ]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"b": "wg==", "n": null, "s": [1, 1.5]})
        );
    }

    #[test]
    fn cbor_roundtrip_preserves_keys() {
        let v = Value::MapAny(HashMap::from([
            (MapKey::Int(1), Value::String("one".into())),
            (MapKey::String("two".into()), Value::Bool(true)),
        ]));
        let back = Value::from_cbor(v.to_cbor());
        assert_eq!(back, v);
    }
}
