//! Navigation Extractor
//!
//! Extracts structured turn-by-turn state from navigation notification text
//! and prepares it for transport.
//!
//! Pipeline:
//! ```text
//! RawNotification → NotificationLayout → NavigationTextParser → NavigationData
//!                                                                   ↓
//!                                        diff(last_sent, current) → DiffPatch → codec
//! ```
//!
//! ## Modules
//!
//! - `locale`: localized number parsing and text direction
//! - `segmenter`: separator splitting and clock-time detection
//! - `parser`: per-line parsing into typed navigation values
//! - `layout`: dispatch of notification fields through a priority list
//! - `model`: the navigation records
//! - `diff`: structural diff and patch application
//! - `value`: the closed set of patch leaf values
//! - `codec`: text (JSON) and binary (bincode) encodings

pub mod codec;
pub mod diff;
pub mod error;
pub mod layout;
pub mod locale;
pub mod model;
pub mod parser;
pub mod segmenter;
pub mod value;

pub use codec::image::Image;
pub use codec::{decode_value_lenient, Format};
pub use diff::{apply, diff, equivalent, snapshot, Field, Record};
pub use error::{CodecError, ParseError, PatchError};
pub use layout::{FieldContent, NotificationField, NotificationLayout, RawNotification};
pub use locale::Locale;
pub use model::{
    DistanceUnit, NavigationData, NavigationDirection, NavigationDistance, NavigationDuration,
    NavigationIcon, NavigationTime, Timestamp,
};
pub use parser::{Directions, NavigationTextParser};
pub use value::{DiffPatch, Value};
