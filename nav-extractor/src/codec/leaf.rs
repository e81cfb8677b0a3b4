//! Locale-independent layouts for time values.
//!
//! Wall-clock times and calendar dates travel as small fixed structs instead
//! of formatted strings. Durations travel as whole seconds.

use crate::error::CodecError;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFields {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl From<NaiveTime> for TimeFields {
    fn from(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
        }
    }
}

impl TryFrom<TimeFields> for NaiveTime {
    type Error = CodecError;

    fn try_from(fields: TimeFields) -> Result<Self, Self::Error> {
        NaiveTime::from_hms_opt(
            fields.hour.into(),
            fields.minute.into(),
            fields.second.into(),
        )
        .ok_or_else(|| CodecError::Invalid {
            kind: "time",
            detail: format!("{:?}", fields),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFields {
    pub day: u8,
    pub month: u8,
    pub year: i32,
}

impl From<NaiveDate> for DateFields {
    fn from(date: NaiveDate) -> Self {
        Self {
            day: date.day() as u8,
            month: date.month() as u8,
            year: date.year(),
        }
    }
}

impl TryFrom<DateFields> for NaiveDate {
    type Error = CodecError;

    fn try_from(fields: DateFields) -> Result<Self, Self::Error> {
        NaiveDate::from_ymd_opt(fields.year, fields.month.into(), fields.day.into()).ok_or_else(
            || CodecError::Invalid {
                kind: "date",
                detail: format!("{:?}", fields),
            },
        )
    }
}

/// `#[serde(with)]` adapter for `Option<NaiveTime>`
pub mod optional_time {
    use super::TimeFields;
    use chrono::NaiveTime;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(TimeFields::from).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        Option::<TimeFields>::deserialize(deserializer)?
            .map(NaiveTime::try_from)
            .transpose()
            .map_err(D::Error::custom)
    }
}

/// `#[serde(with)]` adapter for `Option<NaiveDate>`
pub mod optional_date {
    use super::DateFields;
    use chrono::NaiveDate;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(DateFields::from).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        Option::<DateFields>::deserialize(deserializer)?
            .map(NaiveDate::try_from)
            .transpose()
            .map_err(D::Error::custom)
    }
}

/// `#[serde(with)]` adapter storing a `Duration` as whole seconds
pub mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Format;

    #[test]
    fn test_time_fields_text_layout() {
        let time = NaiveTime::from_hms_opt(14, 32, 5).unwrap();
        let json = serde_json::to_string(&TimeFields::from(time)).unwrap();
        assert_eq!(json, r#"{"hour":14,"minute":32,"second":5}"#);
    }

    #[test]
    fn test_time_fields_binary_is_three_bytes() {
        let time = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        let bytes = Format::Binary.encode(&TimeFields::from(time)).unwrap();
        assert_eq!(bytes, vec![9, 5, 0]);
    }

    #[test]
    fn test_invalid_time_rejected() {
        let fields = TimeFields {
            hour: 25,
            minute: 0,
            second: 0,
        };
        assert!(NaiveTime::try_from(fields).is_err());
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        for format in [Format::Text, Format::Binary] {
            let bytes = format.encode(&DateFields::from(date)).unwrap();
            let fields: DateFields = format.decode(&bytes).unwrap();
            assert_eq!(NaiveDate::try_from(fields).unwrap(), date);
        }
    }

    #[test]
    fn test_invalid_date_rejected() {
        let fields = DateFields {
            day: 30,
            month: 2,
            year: 2023,
        };
        assert!(NaiveDate::try_from(fields).is_err());
    }
}
