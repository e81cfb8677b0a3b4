//! The closed set of values a `DiffPatch` can carry.
//!
//! Records expose their leaf fields as `Value`s so the diff engine can compare
//! and transport them without knowing the concrete Rust type. Wire encoding of
//! `Value` lives in `codec::value`.

use crate::codec::image::Image;
use crate::error::PatchError;
use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeMap;
use std::time::Duration;

/// Minimal mapping of changed field names to their new value or nested patch
pub type DiffPatch = BTreeMap<String, Value>;

/// A single leaf (or nested patch) of a navigation record
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Wall-clock time, second precision
    Time(NaiveTime),
    Date(NaiveDate),
    /// Whole seconds
    Duration(Duration),
    Image(Image),
    Map(DiffPatch),
    /// A type name this build does not know; only produced by lenient decoding
    Unknown(String),
}

/// Type names understood by the codec registry
pub const KNOWN_TYPES: &[&str] = &[
    "null", "bool", "int", "float", "string", "time", "date", "duration", "image", "map",
];

impl Value {
    /// Name used to tag this value on the wire
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Time(_) => "time",
            Value::Date(_) => "date",
            Value::Duration(_) => "duration",
            Value::Image(_) => "image",
            Value::Map(_) => "map",
            Value::Unknown(name) => name,
        }
    }

    /// Primitive values are inlined in the text encoding
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&DiffPatch> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<Image> for Value {
    fn from(value: Image) -> Self {
        Value::Image(value)
    }
}

impl From<DiffPatch> for Value {
    fn from(value: DiffPatch) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Conversion back from a patch leaf into a concrete field type
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, PatchError>;
}

pub(crate) fn mismatch(expected: &'static str, found: &Value) -> PatchError {
    PatchError::TypeMismatch {
        expected,
        found: found.type_name().to_string(),
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Float(f) => Ok(*f),
            // Text encoders may drop the fractional part of whole numbers
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Time(t) => Ok(*t),
            other => Err(mismatch("time", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Date(d) => Ok(*d),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for Duration {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Duration(d) => Ok(*d),
            other => Err(mismatch("duration", other)),
        }
    }
}

impl FromValue for Image {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Image(image) => Ok(image.clone()),
            other => Err(mismatch("image", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
