//! Navigation text parser.
//!
//! Turns the individual text lines of a navigation notification into typed
//! values. Anything that cannot be parsed degrades to its display text; only
//! the low-level helpers (`parse_distance`, `parse_time_of_day`,
//! `parse_duration`, `parse_time_line`) report errors.

use crate::error::ParseError;
use crate::locale::{normalize_digits, Locale};
use crate::model::{DistanceUnit, NavigationDirection, NavigationDistance, NavigationDuration, NavigationTime};
use crate::segmenter::{find_clock, Segments};
use chrono::NaiveTime;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

lazy_static! {
    static ref CLOCK_DURATION: Regex = Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*$").unwrap();
    static ref DURATION_PART: Regex = Regex::new(r"(\d+(?:[.,]\d+)?)\s*([^\d\s]+)").unwrap();
}

/// Outcome of a combined "distance - maneuver" line
#[derive(Debug, Clone, PartialEq)]
pub enum Directions {
    Maneuver(NavigationDirection),
    /// The line has no distance part; the app is recalculating the route
    Rerouting(String),
}

/// Locale-aware parser for notification text lines
#[derive(Debug, Clone, Default)]
pub struct NavigationTextParser {
    locale: Locale,
}

impl NavigationTextParser {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Parse `"2.3 km"` (or `"كم ٢٫٣"` in RTL locales).
    ///
    /// Fails on anything but exactly two tokens, and on an unknown unit.
    pub fn parse_distance(&self, text: &str) -> Result<NavigationDistance, ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(ParseError::Distance(text.to_string()));
        }

        let (magnitude, unit) = if self.locale.rtl {
            (tokens[1], tokens[0])
        } else {
            (tokens[0], tokens[1])
        };

        let unit = DistanceUnit::from_token(unit)
            .ok_or_else(|| ParseError::UnknownUnit(unit.to_string()))?;
        let magnitude = self.locale.parse_number(magnitude)?;

        Ok(NavigationDistance {
            display_text: Some(text.to_string()),
            magnitude,
            unit,
        })
    }

    /// Find and parse the first clock time in `text`, honouring AM/PM markers
    pub fn parse_time_of_day(&self, text: &str) -> Result<NaiveTime, ParseError> {
        let normalized = normalize_digits(text);
        let clock = find_clock(&normalized).ok_or_else(|| ParseError::Time(text.to_string()))?;

        let hour = match clock.pm {
            Some(true) if clock.hour < 12 => clock.hour + 12,
            Some(false) if clock.hour == 12 => 0,
            _ => clock.hour,
        };

        NaiveTime::from_hms_opt(hour, clock.minute, 0).ok_or_else(|| ParseError::Time(text.to_string()))
    }

    /// Best-effort duration: `"5 min"`, `"1 h 20 min"`, `"45 s"`, `"1:05"`
    pub fn parse_duration(&self, text: &str) -> Result<Duration, ParseError> {
        let normalized = normalize_digits(text);

        if let Some(captures) = CLOCK_DURATION.captures(&normalized) {
            let hours: u64 = captures[1].parse().map_err(|_| ParseError::Time(text.to_string()))?;
            let minutes: u64 = captures[2].parse().map_err(|_| ParseError::Time(text.to_string()))?;
            return Ok(Duration::from_secs(hours * 3600 + minutes * 60));
        }

        let mut seconds = 0.0;
        let mut matched = false;
        for captures in DURATION_PART.captures_iter(&normalized) {
            let Some(scale) = duration_unit_seconds(&captures[2]) else {
                continue;
            };
            let amount = self.locale.parse_number(&captures[1]).or_else(|_| {
                // Durations sometimes use '.' regardless of locale
                captures[1].replace(',', ".").parse::<f64>()
                    .map_err(|_| ParseError::Number(captures[1].to_string()))
            })?;
            seconds += amount * scale;
            matched = true;
        }

        if !matched {
            return Err(ParseError::Time(text.to_string()));
        }
        Ok(Duration::from_secs(seconds.round() as u64))
    }

    /// Title line: the distance to the next maneuver
    pub fn parse_title(&self, text: &str) -> NavigationDirection {
        let distance = self.parse_distance(text).unwrap_or_else(|e| {
            debug!("Keeping raw navigation title: {}", e);
            NavigationDistance::raw(text)
        });

        let direction = NavigationDirection {
            distance: Some(distance),
            ..Default::default()
        };
        debug!("Navigation title parsed to {:?}", direction);
        direction
    }

    /// Description line: the maneuver text, verbatim.
    ///
    /// An empty description yields `(None, None)`, which callers treat as
    /// rerouting.
    pub fn parse_description(&self, text: &str, rich_text: Option<&str>) -> (Option<String>, Option<String>) {
        if text.trim().is_empty() {
            debug!("Empty navigation description");
            return (None, None);
        }
        (Some(text.to_string()), rich_text.map(str::to_string))
    }

    /// Combined `"duration - distance - eta"` line; exactly three parts
    pub fn parse_time_line(&self, text: &str) -> Result<(NavigationDistance, NavigationTime), ParseError> {
        let segments = Segments::split(text);
        debug!("Navigation time split in {:?}", segments.parts);

        if segments.len() != 3 {
            return Err(ParseError::Segments {
                text: text.to_string(),
                expected: 3,
                found: segments.len(),
            });
        }

        let (duration, distance, eta) = (segments.parts[0], segments.parts[1], segments.parts[2]);

        let remaining = self.parse_distance(distance).unwrap_or_else(|e| {
            debug!("Keeping raw remaining distance: {}", e);
            NavigationDistance::raw(distance)
        });

        Ok((remaining, self.parse_eta(eta, Some(duration))))
    }

    /// ETA text, with the duration segment when the layout provides one
    pub fn parse_eta(&self, eta: &str, duration: Option<&str>) -> NavigationTime {
        let time_of_day = match self.parse_time_of_day(eta) {
            Ok(time) => Some(time),
            Err(e) => {
                debug!("No clock time in ETA: {}", e);
                None
            }
        };

        let duration = duration.map(|text| NavigationDuration {
            display_text: Some(text.to_string()),
            duration: self.parse_duration(text).unwrap_or_default(),
        });

        NavigationTime {
            display_text: Some(eta.to_string()),
            time_of_day,
            date: None,
            duration,
        }
    }

    /// Lockscreen directions line: `"300 m - Turn left - Main St"`
    pub fn parse_directions_line(&self, text: &str, rich_text: Option<&str>) -> Directions {
        let segments = Segments::split(text);
        debug!("Navigation directions split in {:?}", segments.parts);

        if segments.len() < 2 {
            return Directions::Rerouting(text.to_string());
        }

        let maneuver = segments.join(1..segments.len());
        let direction = match self.parse_distance(segments.parts[0]) {
            Ok(distance) => NavigationDirection {
                display_text: Some(maneuver),
                rich_text: rich_text.map(str::to_string),
                distance: Some(distance),
            },
            Err(e) => {
                debug!("Directions without a parsable distance: {}", e);
                NavigationDirection {
                    display_text: Some(maneuver),
                    ..Default::default()
                }
            }
        };

        Directions::Maneuver(direction)
    }

    /// Lockscreen ETA line: `"Main St - 14:32 ETA"` into destination and ETA
    pub fn parse_lockscreen_eta(&self, text: &str) -> Option<(String, NavigationTime)> {
        let segments = Segments::split(text);
        debug!("Navigation ETA split in {:?}", segments.parts);

        if segments.len() < 2 {
            return None;
        }

        let last = segments.len() - 1;
        let destination = segments.join(0..last);
        Some((destination, self.parse_eta(segments.parts[last], None)))
    }
}

/// Seconds per unit for a duration unit token, across the common locales
fn duration_unit_seconds(token: &str) -> Option<f64> {
    let token = token.trim_end_matches('.').to_lowercase();
    let t = token.as_str();

    if t.starts_with("min") || t.starts_with("мин") || t.starts_with("دقيق") || t == "m" {
        Some(60.0)
    } else if t.starts_with('h')
        || t.starts_with("std")
        || t.starts_with("uur")
        || t.starts_with("or")
        || t.starts_with('ч')
        || t.starts_with("ساع")
    {
        Some(3600.0)
    } else if t == "s" || t.starts_with("sec") || t.starts_with("seg") || t.starts_with("сек") || t == "с" {
        Some(1.0)
    } else if t == "d" || t.starts_with("day") || t.starts_with("tag") || t.starts_with("jour") || t == "j" || t == "д" {
        Some(86400.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn english() -> NavigationTextParser {
        NavigationTextParser::new(Locale::english())
    }

    #[test]
    fn test_parse_distance() {
        let distance = english().parse_distance("2.3 km").unwrap();
        assert_eq!(distance.magnitude, 2.3);
        assert_eq!(distance.unit, DistanceUnit::Km);
        assert_eq!(distance.display_text.as_deref(), Some("2.3 km"));
    }

    #[test]
    fn test_parse_distance_unknown_unit() {
        assert_eq!(
            english().parse_distance("10 xx"),
            Err(ParseError::UnknownUnit("xx".into()))
        );
    }

    #[test]
    fn test_parse_distance_token_count() {
        assert!(english().parse_distance("300").is_err());
        assert!(english().parse_distance("in 300 m").is_err());
    }

    #[test]
    fn test_parse_distance_rtl() {
        let parser = NavigationTextParser::new(Locale::from_tag("ar"));
        let distance = parser.parse_distance("كم ٢٫٣").unwrap();
        assert_eq!(distance.unit, DistanceUnit::Km);
        assert_eq!(distance.magnitude, 2.3);
    }

    #[test]
    fn test_time_of_day() {
        let parser = english();
        assert_eq!(
            parser.parse_time_of_day("14:32 ETA").unwrap(),
            NaiveTime::from_hms_opt(14, 32, 0).unwrap()
        );
        assert_eq!(
            parser.parse_time_of_day("2:05 PM").unwrap(),
            NaiveTime::from_hms_opt(14, 5, 0).unwrap()
        );
        assert_eq!(
            parser.parse_time_of_day("12:10 AM").unwrap(),
            NaiveTime::from_hms_opt(0, 10, 0).unwrap()
        );
        assert!(parser.parse_time_of_day("99:99").is_err());
    }

    #[test]
    fn test_durations() {
        let parser = english();
        assert_eq!(parser.parse_duration("5 min").unwrap().as_secs(), 300);
        assert_eq!(parser.parse_duration("1 h 20 min").unwrap().as_secs(), 4800);
        assert_eq!(parser.parse_duration("2 hr").unwrap().as_secs(), 7200);
        assert_eq!(parser.parse_duration("45 s").unwrap().as_secs(), 45);
        assert_eq!(parser.parse_duration("1:05").unwrap().as_secs(), 3900);
        assert!(parser.parse_duration("soon").is_err());
    }

    #[test]
    fn test_localized_durations() {
        let parser = NavigationTextParser::new(Locale::from_tag("de-DE"));
        assert_eq!(parser.parse_duration("1 Std. 5 Min.").unwrap().as_secs(), 3900);
    }

    #[test]
    fn test_description() {
        let parser = english();
        assert_eq!(
            parser.parse_description("Turn left", Some("<b>Turn left</b>")),
            (Some("Turn left".into()), Some("<b>Turn left</b>".into()))
        );
        assert_eq!(parser.parse_description("  ", None), (None, None));
    }

    #[test]
    fn test_time_line_wrong_part_count() {
        let err = english().parse_time_line("5 min - 2.3 km").unwrap_err();
        assert_eq!(
            err,
            ParseError::Segments {
                text: "5 min - 2.3 km".into(),
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_time_line_raw_distance() {
        let (distance, eta) = english().parse_time_line("5 min - far away - 14:32").unwrap();
        assert_eq!(distance, NavigationDistance::raw("far away"));
        assert!(eta.time_of_day.is_some());
    }

    #[test]
    fn test_directions_line() {
        let parser = english();
        match parser.parse_directions_line("300 m · Turn left · Main St", None) {
            Directions::Maneuver(direction) => {
                assert_eq!(direction.display_text.as_deref(), Some("Turn left · Main St"));
                assert_eq!(direction.distance.unwrap().magnitude, 300.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            parser.parse_directions_line("Rerouting...", None),
            Directions::Rerouting("Rerouting...".into())
        );
    }

    #[test]
    fn test_lockscreen_eta() {
        let (destination, eta) = english()
            .parse_lockscreen_eta("Home - Work - 18:05 ETA")
            .unwrap();
        assert_eq!(destination, "Home - Work");
        assert_eq!(eta.time_of_day, NaiveTime::from_hms_opt(18, 5, 0));
        assert_eq!(eta.duration, None);

        assert!(english().parse_lockscreen_eta("Home").is_none());
    }
}
