//! Serialization of documents.
//!
//! Documents are stored as pretty-printed JSON with map keys in insertion
//! order and a trailing newline. Encoding the same tree always yields the
//! same bytes. `null` has no counterpart in the tree and is rejected on
//! decode; non-finite floats are rejected on encode.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ConfigMap, ConfigNode, Scalar};

/// Encode a document to its canonical byte form.
pub fn encode(node: &ConfigNode) -> Result<Vec<u8>, serde_json::Error> {
    to_pretty_bytes(node)
}

/// Decode a document from bytes produced by [`encode`] (or any JSON text
/// without `null`).
pub fn decode(bytes: &[u8]) -> Result<ConfigNode, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub(crate) fn to_pretty_bytes<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = serde_json::to_vec_pretty(value)?;
    out.push(b'\n');
    Ok(out)
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::String(s) => serializer.serialize_str(s),
            Scalar::Integer(n) => serializer.serialize_i64(*n),
            Scalar::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Scalar::Float(f) => Err(ser::Error::custom(format!(
                "non-finite float {} cannot be stored",
                f
            ))),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl Serialize for ConfigMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigNode::Scalar(scalar) => scalar.serialize(serializer),
            ConfigNode::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ConfigNode::Map(map) => map.serialize(serializer),
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = ConfigNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number, boolean, list or map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Scalar(Scalar::Integer(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigNode, E> {
        i64::try_from(v)
            .map(|n| ConfigNode::Scalar(Scalar::Integer(n)))
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &"a 64-bit signed integer"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Scalar(Scalar::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Scalar(Scalar::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Scalar(Scalar::String(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<ConfigNode, A::Error> {
        let mut items = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(item) = access.next_element::<ConfigNode>()? {
            items.push(item);
        }
        Ok(ConfigNode::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigNode, A::Error> {
        let mut map = ConfigMap::new();
        while let Some((key, value)) = access.next_entry::<String, ConfigNode>()? {
            map.insert(key, value);
        }
        Ok(ConfigNode::Map(map))
    }
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}
