//! Wire encoding of `Value`, the open-ended patch leaf.
//!
//! Text: primitives are inlined as plain JSON; everything else becomes
//! `{"type": <name>, "value": <payload>}`.
//!
//! Binary: every value, primitives included, is a `(type name, payload bytes)`
//! pair where the payload is itself bincode. Length-prefixed payloads let a
//! lenient reader skip types it does not know.

use super::binary_options;
use super::leaf::{DateFields, TimeFields};
use super::Format;
use crate::codec::image::Image;
use crate::error::CodecError;
use crate::value::{DiffPatch, Value, KNOWN_TYPES};
use bincode::Options;
use chrono::{NaiveDate, NaiveTime};
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeTuple};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// The untagged payload of a value
struct Payload<'a>(&'a Value);

impl Serialize for Payload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null | Value::Unknown(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Time(t) => TimeFields::from(*t).serialize(serializer),
            Value::Date(d) => DateFields::from(*d).serialize(serializer),
            Value::Duration(d) => serializer.serialize_u64(d.as_secs()),
            Value::Image(image) => image.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            if self.is_primitive() {
                return Payload(self).serialize(serializer);
            }
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("type", self.type_name())?;
            map.serialize_entry("value", &Payload(self))?;
            map.end()
        } else {
            let payload = binary_options()
                .serialize(&Payload(self))
                .map_err(<S::Error as ser::Error>::custom)?;
            let mut tuple = serializer.serialize_tuple(2)?;
            tuple.serialize_element(self.type_name())?;
            tuple.serialize_element(&payload)?;
            tuple.end()
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueSeed::strict().deserialize(deserializer)
    }
}

/// Decodes a `Value`, deciding what to do with unregistered type names
#[derive(Debug, Clone, Copy)]
pub struct ValueSeed {
    lenient: bool,
}

impl ValueSeed {
    /// Unknown type names are a decode error
    pub fn strict() -> Self {
        Self { lenient: false }
    }

    /// Unknown type names decode to `Value::Unknown`
    pub fn lenient() -> Self {
        Self { lenient: true }
    }

    fn unknown<E: de::Error>(self, name: &str) -> Result<Value, E> {
        if self.lenient {
            Ok(Value::Unknown(name.to_string()))
        } else {
            Err(E::custom(CodecError::UnknownType(name.to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(TextVisitor(self))
        } else {
            deserializer.deserialize_tuple(2, BinaryVisitor(self))
        }
    }
}

/// Decodes the payload of a value whose type name is already known
struct TypedSeed<'a> {
    name: &'a str,
    seed: ValueSeed,
}

impl<'de> DeserializeSeed<'de> for TypedSeed<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        let value = match self.name {
            "null" => {
                <()>::deserialize(deserializer)?;
                Value::Null
            }
            "bool" => Value::Bool(bool::deserialize(deserializer)?),
            "int" => Value::Int(i64::deserialize(deserializer)?),
            "float" => Value::Float(f64::deserialize(deserializer)?),
            "string" => Value::String(String::deserialize(deserializer)?),
            "time" => {
                let fields = TimeFields::deserialize(deserializer)?;
                Value::Time(NaiveTime::try_from(fields).map_err(de::Error::custom)?)
            }
            "date" => {
                let fields = DateFields::deserialize(deserializer)?;
                Value::Date(NaiveDate::try_from(fields).map_err(de::Error::custom)?)
            }
            "duration" => Value::Duration(Duration::from_secs(u64::deserialize(deserializer)?)),
            "image" => Value::Image(Image::deserialize(deserializer)?),
            "map" => Value::Map(deserializer.deserialize_map(PatchVisitor(self.seed))?),
            other => {
                if self.seed.lenient {
                    IgnoredAny::deserialize(deserializer)?;
                }
                return self.seed.unknown(other);
            }
        };
        Ok(value)
    }
}

struct PatchVisitor(ValueSeed);

impl<'de> Visitor<'de> for PatchVisitor {
    type Value = DiffPatch;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of field names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DiffPatch, A::Error> {
        let mut patch = DiffPatch::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self.0)?;
            patch.insert(key, value);
        }
        Ok(patch)
    }
}

struct TextVisitor(ValueSeed);

impl<'de> Visitor<'de> for TextVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a primitive or a {type, value} object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        self.0.deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut type_name: Option<String> = None;
        let mut decoded: Option<Value> = None;
        // Holds "value" when it arrives before "type"
        let mut pending: Option<serde_json::Value> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" => type_name = Some(map.next_value()?),
                "value" => match &type_name {
                    Some(name) => {
                        decoded = Some(map.next_value_seed(TypedSeed {
                            name,
                            seed: self.0,
                        })?)
                    }
                    None => pending = Some(map.next_value()?),
                },
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let name = type_name.ok_or_else(|| de::Error::missing_field("type"))?;
        match (decoded, pending) {
            (Some(value), _) => Ok(value),
            (None, Some(raw)) => TypedSeed {
                name: &name,
                seed: self.0,
            }
            .deserialize(raw)
            .map_err(de::Error::custom),
            (None, None) => Err(de::Error::missing_field("value")),
        }
    }
}

struct BinaryVisitor(ValueSeed);

impl<'de> Visitor<'de> for BinaryVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a (type name, payload) pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let name: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let payload: Vec<u8> = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;

        if !KNOWN_TYPES.contains(&name.as_str()) {
            return self.0.unknown(&name);
        }

        binary_options()
            .deserialize_seed(
                TypedSeed {
                    name: &name,
                    seed: self.0,
                },
                &payload,
            )
            .map_err(de::Error::custom)
    }
}

/// Decode a single value, mapping unknown type names to `Value::Unknown`
pub fn decode_value_lenient(bytes: &[u8], format: Format) -> Result<Value, CodecError> {
    match format {
        Format::Text => {
            let mut deserializer = serde_json::Deserializer::from_slice(bytes);
            let value = ValueSeed::lenient().deserialize(&mut deserializer)?;
            deserializer.end()?;
            Ok(value)
        }
        Format::Binary => Ok(binary_options().deserialize_seed(ValueSeed::lenient(), bytes)?),
    }
}
