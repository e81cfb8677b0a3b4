//! Splitting of notification lines into segments.
//!
//! Navigation lines join their parts with "whitespace, punctuation,
//! whitespace" (` - `, ` · `, ` • `). The first separator found is kept so
//! multi-part remainders can be joined back as the source printed them.

use lazy_static::lazy_static;
use regex::Regex;

/// Separator used when a line has none of its own
pub const DEFAULT_SEPARATOR: &str = " - ";

lazy_static! {
    static ref SEPARATOR: Regex = Regex::new(r"\s+[[:punct:]\p{P}]+\s+").unwrap();

    /// `14:32`, `2.05 PM`, `٩:٠٥ م`; digits are normalized before matching
    static ref CLOCK: Regex =
        Regex::new(r"(\d{1,2})[[:punct:]](\d{2})(?:\s+(AM|PM|am|pm|ص|م))?").unwrap();
}

/// A line split on its separator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments<'a> {
    pub parts: Vec<&'a str>,
    pub separator: &'a str,
}

impl<'a> Segments<'a> {
    pub fn split(text: &'a str) -> Self {
        let separator = SEPARATOR
            .find(text)
            .map_or(DEFAULT_SEPARATOR, |m| m.as_str());

        Self {
            parts: SEPARATOR.split(text).collect(),
            separator,
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Join `parts[range]` back with the line's own separator
    pub fn join(&self, range: std::ops::Range<usize>) -> String {
        self.parts[range].join(self.separator)
    }
}

/// Clock time located inside a longer string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockMatch {
    pub hour: u32,
    pub minute: u32,
    /// `Some(true)` for PM, `Some(false)` for AM, `None` for 24-hour
    pub pm: Option<bool>,
}

/// Find the first clock time in `text` (ASCII digits expected)
pub fn find_clock(text: &str) -> Option<ClockMatch> {
    let captures = CLOCK.captures(text)?;
    let hour = captures.get(1)?.as_str().parse().ok()?;
    let minute = captures.get(2)?.as_str().parse().ok()?;
    let pm = captures
        .get(3)
        .map(|marker| matches!(marker.as_str(), "PM" | "pm" | "م"));

    Some(ClockMatch { hour, minute, pm })
}
