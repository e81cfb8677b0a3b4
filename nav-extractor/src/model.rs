//! Navigation data model.
//!
//! Every record implements `Record` with an explicit field table so it can be
//! diffed and patched. Field names match the camelCase wire names.

use crate::codec::image::Image;
use crate::codec::leaf;
use crate::diff::{self, apply_nested, apply_optional, assign, Field, Record};
use crate::error::PatchError;
use crate::value::{mismatch, FromValue, Value};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

fn unknown_field(record: &'static str, name: &str) -> PatchError {
    PatchError::UnknownField {
        record,
        field: name.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DistanceUnit {
    Km,
    M,
    Ft,
    Mi,
    Yd,
    #[default]
    Invalid,
}

impl DistanceUnit {
    /// Map a unit token as printed by the navigation app
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "km" | "км" | "كم" => Some(DistanceUnit::Km),
            "m" | "м" | "متر" => Some(DistanceUnit::M),
            "mi" => Some(DistanceUnit::Mi),
            "ft" => Some(DistanceUnit::Ft),
            "yd" => Some(DistanceUnit::Yd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Km => "KM",
            DistanceUnit::M => "M",
            DistanceUnit::Ft => "FT",
            DistanceUnit::Mi => "MI",
            DistanceUnit::Yd => "YD",
            DistanceUnit::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceUnit {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KM" => Ok(DistanceUnit::Km),
            "M" => Ok(DistanceUnit::M),
            "FT" => Ok(DistanceUnit::Ft),
            "MI" => Ok(DistanceUnit::Mi),
            "YD" => Ok(DistanceUnit::Yd),
            "INVALID" => Ok(DistanceUnit::Invalid),
            other => Err(PatchError::Unit(other.to_string())),
        }
    }
}

impl FromValue for DistanceUnit {
    fn from_value(value: &Value) -> Result<Self, PatchError> {
        match value {
            Value::String(s) => s.parse(),
            other => Err(mismatch("string", other)),
        }
    }
}

/// A distance as displayed, plus its parsed magnitude and unit.
///
/// `unit == Invalid` means parsing failed and only `display_text` is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationDistance {
    pub display_text: Option<String>,
    pub magnitude: f64,
    pub unit: DistanceUnit,
}

impl Default for NavigationDistance {
    fn default() -> Self {
        Self {
            display_text: None,
            magnitude: -1.0,
            unit: DistanceUnit::Invalid,
        }
    }
}

impl NavigationDistance {
    /// Unparsed distance keeping only the original text
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            display_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.unit != DistanceUnit::Invalid
    }
}

impl Record for NavigationDistance {
    fn record_name(&self) -> &'static str {
        "NavigationDistance"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("displayText", Field::Leaf(self.display_text.clone().into())),
            ("magnitude", Field::Leaf(self.magnitude.into())),
            ("unit", Field::Leaf(self.unit.as_str().into())),
        ]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
        match name {
            "displayText" => assign(&mut self.display_text, value),
            "magnitude" => assign(&mut self.magnitude, value),
            "unit" => assign(&mut self.unit, value),
            _ => Err(unknown_field(self.record_name(), name)),
        }
    }
}

/// The upcoming maneuver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationDirection {
    pub display_text: Option<String>,
    pub rich_text: Option<String>,
    pub distance: Option<NavigationDistance>,
}

impl Record for NavigationDirection {
    fn record_name(&self) -> &'static str {
        "NavigationDirection"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("displayText", Field::Leaf(self.display_text.clone().into())),
            ("richText", Field::Leaf(self.rich_text.clone().into())),
            (
                "distance",
                Field::OptionalRecord(self.distance.as_ref().map(|d| d as &dyn Record)),
            ),
        ]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
        match name {
            "displayText" => assign(&mut self.display_text, value),
            "richText" => assign(&mut self.rich_text, value),
            "distance" => apply_optional(&mut self.distance, value),
            _ => Err(unknown_field(self.record_name(), name)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationDuration {
    pub display_text: Option<String>,
    #[serde(rename = "seconds", with = "leaf::seconds")]
    pub duration: Duration,
}

impl NavigationDuration {
    pub fn new(display_text: impl Into<String>, duration: Duration) -> Self {
        Self {
            display_text: Some(display_text.into()),
            duration,
        }
    }

    pub fn seconds(&self) -> u64 {
        self.duration.as_secs()
    }
}

impl Record for NavigationDuration {
    fn record_name(&self) -> &'static str {
        "NavigationDuration"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("displayText", Field::Leaf(self.display_text.clone().into())),
            ("seconds", Field::Leaf(self.duration.into())),
        ]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
        match name {
            "displayText" => assign(&mut self.display_text, value),
            "seconds" => assign(&mut self.duration, value),
            _ => Err(unknown_field(self.record_name(), name)),
        }
    }
}

/// Estimated time of arrival
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationTime {
    pub display_text: Option<String>,
    #[serde(with = "leaf::optional_time")]
    pub time_of_day: Option<NaiveTime>,
    #[serde(with = "leaf::optional_date")]
    pub date: Option<NaiveDate>,
    pub duration: Option<NavigationDuration>,
}

impl NavigationTime {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            display_text: Some(text.into()),
            ..Default::default()
        }
    }
}

impl Record for NavigationTime {
    fn record_name(&self) -> &'static str {
        "NavigationTime"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("displayText", Field::Leaf(self.display_text.clone().into())),
            ("timeOfDay", Field::Leaf(self.time_of_day.into())),
            ("date", Field::Leaf(self.date.into())),
            (
                "duration",
                Field::OptionalRecord(self.duration.as_ref().map(|d| d as &dyn Record)),
            ),
        ]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
        match name {
            "displayText" => assign(&mut self.display_text, value),
            "timeOfDay" => assign(&mut self.time_of_day, value),
            "date" => assign(&mut self.date, value),
            "duration" => apply_optional(&mut self.duration, value),
            _ => Err(unknown_field(self.record_name(), name)),
        }
    }
}

/// Maneuver icon; equality compares pixels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationIcon {
    pub image: Option<Image>,
}

impl Record for NavigationIcon {
    fn record_name(&self) -> &'static str {
        "NavigationIcon"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("image", Field::Leaf(self.image.clone().into()))]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
        match name {
            "image" => assign(&mut self.image, value),
            _ => Err(unknown_field(self.record_name(), name)),
        }
    }
}

/// Epoch milliseconds of the source event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

/// Full navigation state extracted from one notification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationData {
    pub is_rerouting: bool,
    pub can_stop: bool,
    pub icon: NavigationIcon,
    pub next_direction: NavigationDirection,
    pub remaining_distance: NavigationDistance,
    pub eta: NavigationTime,
    pub final_destination_text: Option<String>,
    pub post_time: Timestamp,
}

impl NavigationData {
    /// Rerouting, or all three required display texts present
    pub fn is_valid(&self) -> bool {
        self.is_rerouting
            || (self.next_direction.display_text.is_some()
                && self.remaining_distance.display_text.is_some()
                && self.eta.display_text.is_some())
    }
}

/// Equality ignores `post_time`
impl PartialEq for NavigationData {
    fn eq(&self, other: &Self) -> bool {
        diff::equivalent(self, other)
    }
}

impl Record for NavigationData {
    fn record_name(&self) -> &'static str {
        "NavigationData"
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("isRerouting", Field::Leaf(self.is_rerouting.into())),
            ("canStop", Field::Leaf(self.can_stop.into())),
            ("icon", Field::Record(&self.icon)),
            ("nextDirection", Field::Record(&self.next_direction)),
            ("remainingDistance", Field::Record(&self.remaining_distance)),
            ("eta", Field::Record(&self.eta)),
            (
                "finalDestinationText",
                Field::Leaf(self.final_destination_text.clone().into()),
            ),
            ("postTime", Field::Volatile),
        ]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
        match name {
            "isRerouting" => assign(&mut self.is_rerouting, value),
            "canStop" => assign(&mut self.can_stop, value),
            "icon" => apply_nested(&mut self.icon, value),
            "nextDirection" => apply_nested(&mut self.next_direction, value),
            "remainingDistance" => apply_nested(&mut self.remaining_distance, value),
            "eta" => apply_nested(&mut self.eta, value),
            "finalDestinationText" => assign(&mut self.final_destination_text, value),
            // Volatile; accepted and ignored so full snapshots of newer peers apply
            "postTime" => Ok(()),
            _ => Err(unknown_field(self.record_name(), name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Format;
    use pretty_assertions::assert_eq;

    fn driving() -> NavigationData {
        NavigationData {
            next_direction: NavigationDirection {
                display_text: Some("Turn left onto Main St".into()),
                rich_text: None,
                distance: Some(NavigationDistance {
                    display_text: Some("300 m".into()),
                    magnitude: 300.0,
                    unit: DistanceUnit::M,
                }),
            },
            remaining_distance: NavigationDistance {
                display_text: Some("2.3 km".into()),
                magnitude: 2.3,
                unit: DistanceUnit::Km,
            },
            eta: NavigationTime {
                display_text: Some("14:32 ETA".into()),
                time_of_day: NaiveTime::from_hms_opt(14, 32, 0),
                date: None,
                duration: Some(NavigationDuration::new("5 min", Duration::from_secs(300))),
            },
            post_time: Timestamp(1_700_000_000_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_distance_is_invalid() {
        let distance = NavigationDistance::default();
        assert_eq!(distance.magnitude, -1.0);
        assert!(!distance.is_valid());
    }

    #[test]
    fn test_unit_tokens() {
        assert_eq!(DistanceUnit::from_token("км"), Some(DistanceUnit::Km));
        assert_eq!(DistanceUnit::from_token("متر"), Some(DistanceUnit::M));
        assert_eq!(DistanceUnit::from_token("yd"), Some(DistanceUnit::Yd));
        assert_eq!(DistanceUnit::from_token("xx"), None);
    }

    #[test]
    fn test_validity() {
        assert!(driving().is_valid());
        assert!(!NavigationData::default().is_valid());

        let rerouting = NavigationData {
            is_rerouting: true,
            ..Default::default()
        };
        assert!(rerouting.is_valid());
    }

    #[test]
    fn test_equality_ignores_post_time() {
        let a = driving();
        let mut b = driving();
        b.post_time = Timestamp(0);
        assert_eq!(a, b);

        b.can_stop = true;
        assert_ne!(a, b);
    }

    #[test]
    fn test_text_field_names() {
        let json = serde_json::to_value(driving()).unwrap();
        assert_eq!(json["remainingDistance"]["unit"], "KM");
        assert_eq!(json["eta"]["timeOfDay"]["hour"], 14);
        assert_eq!(json["eta"]["duration"]["seconds"], 300);
        assert_eq!(json["postTime"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_snapshot_round_trip_both_formats() {
        let data = driving();
        for format in [Format::Text, Format::Binary] {
            let bytes = format.encode(&data).unwrap();
            let decoded: NavigationData = format.decode(&bytes).unwrap();
            assert_eq!(decoded, data);
            assert_eq!(decoded.post_time, data.post_time);
        }
    }

    #[test]
    fn test_patch_unit_string() {
        let mut distance = NavigationDistance::default();
        distance
            .apply_field("unit", &Value::String("MI".into()))
            .unwrap();
        assert_eq!(distance.unit, DistanceUnit::Mi);
        assert!(distance
            .apply_field("unit", &Value::String("parsec".into()))
            .is_err());
    }
}
