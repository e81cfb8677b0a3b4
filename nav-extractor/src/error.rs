//! Error types for the nav-extractor crate.
//!
//! - `ParseError`: a text segment could not be turned into a typed value
//! - `PatchError`: a diff patch does not fit the record it is applied to
//! - `CodecError`: a value could not be encoded or decoded

use thiserror::Error;

/// Errors raised while parsing navigation text.
///
/// These never abort a whole extraction: the layout catches them and keeps
/// the raw string as display text instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Impossible to parse navigation distance {0}")]
    Distance(String),

    #[error("Impossible to parse a distance unit {0}")]
    UnknownUnit(String),

    #[error("Impossible to parse number {0}")]
    Number(String),

    #[error("Impossible to parse navigation time {0}")]
    Time(String),

    #[error("Expected {expected} segments in '{text}', found {found}")]
    Segments {
        text: String,
        expected: usize,
        found: usize,
    },
}

/// Errors raised while applying a `DiffPatch` to a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("Unknown field '{field}' for {record}")]
    UnknownField { record: &'static str, field: String },

    #[error("Expected a {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Unknown distance unit {0}")]
    Unit(String),
}

/// Errors raised by the text and binary codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary codec error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unknown value type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} value: {detail}")]
    Invalid { kind: &'static str, detail: String },

    #[error("Image content hash mismatch (expected {expected}, computed {computed})")]
    HashMismatch { expected: String, computed: String },
}
