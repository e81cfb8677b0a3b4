//! Text and binary encodings for navigation records and patch values.
//!
//! The text format is JSON. The binary format is bincode with fixed-width
//! integers. Types whose layout differs between the two formats branch on
//! `Serializer::is_human_readable`.

pub mod image;
pub mod leaf;
pub mod value;

use crate::error::CodecError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use self::value::{decode_value_lenient, ValueSeed};

/// Upper bound for a single binary frame (16 MB)
const MAX_BINARY_SIZE: u64 = 16 * 1024 * 1024;

/// Wire format negotiated with the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Text,
    Binary,
}

impl Format {
    pub fn from_binary_flag(use_binary: bool) -> Self {
        if use_binary {
            Format::Binary
        } else {
            Format::Text
        }
    }

    pub fn is_binary(self) -> bool {
        self == Format::Binary
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Format::Text => Ok(serde_json::to_vec(value)?),
            Format::Binary => Ok(binary_options().serialize(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Format::Text => Ok(serde_json::from_slice(bytes)?),
            Format::Binary => Ok(binary_options().deserialize(bytes)?),
        }
    }
}

/// Bincode configuration shared by every binary payload, nested ones included
pub(crate) fn binary_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_BINARY_SIZE)
}
