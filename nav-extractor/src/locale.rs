//! Locale conventions used when reading numbers and distances.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};

/// Number formatting and text direction of the source UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub tag: String,
    pub decimal_separator: char,
    pub grouping_separator: char,
    /// Right-to-left layout: the unit token precedes the magnitude
    pub rtl: bool,
}

const NBSP: char = '\u{00A0}';
const NARROW_NBSP: char = '\u{202F}';
const ARABIC_DECIMAL: char = '\u{066B}';
const ARABIC_GROUPING: char = '\u{066C}';

impl Default for Locale {
    fn default() -> Self {
        Self::english()
    }
}

impl Locale {
    fn preset(tag: &str, decimal_separator: char, grouping_separator: char, rtl: bool) -> Self {
        Self {
            tag: tag.to_string(),
            decimal_separator,
            grouping_separator,
            rtl,
        }
    }

    pub fn english() -> Self {
        Self::preset("en-US", '.', ',', false)
    }

    /// Resolve a BCP-47 style tag; unknown languages use English conventions
    pub fn from_tag(tag: &str) -> Self {
        let language = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match language.as_str() {
            "de" | "it" | "es" | "pt" | "nl" | "id" | "tr" => Self::preset(tag, ',', '.', false),
            "fr" => Self::preset(tag, ',', NARROW_NBSP, false),
            "ru" | "uk" | "pl" | "cs" | "sv" | "fi" | "nb" => Self::preset(tag, ',', NBSP, false),
            "ar" | "fa" => Self::preset(tag, ARABIC_DECIMAL, ARABIC_GROUPING, true),
            "he" | "iw" | "ur" => Self::preset(tag, '.', ',', true),
            "en" | "" => Self::preset(if tag.is_empty() { "en-US" } else { tag }, '.', ',', false),
            _ => Self::preset(tag, '.', ',', false),
        }
    }

    /// Parse a localized number such as `2.3`, `2,3`, `1.204,5` or `٢٫٣`
    pub fn parse_number(&self, text: &str) -> Result<f64, ParseError> {
        let mut normalized = String::with_capacity(text.len());

        for c in text.trim().chars() {
            if let Some(digit) = ascii_digit(c) {
                normalized.push(digit);
            } else if c == self.decimal_separator || c == ARABIC_DECIMAL {
                normalized.push('.');
            } else if c == self.grouping_separator
                || c == ARABIC_GROUPING
                || (self.grouping_separator.is_whitespace() && c.is_whitespace())
            {
                continue;
            } else {
                return Err(ParseError::Number(text.to_string()));
            }
        }

        if normalized.is_empty() || normalized.matches('.').count() > 1 {
            return Err(ParseError::Number(text.to_string()));
        }

        normalized
            .parse::<f64>()
            .map_err(|_| ParseError::Number(text.to_string()))
    }
}

/// Map ASCII, Arabic-Indic and extended Arabic-Indic digits to ASCII
fn ascii_digit(c: char) -> Option<char> {
    let offset = match c {
        '0'..='9' => return Some(c),
        '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
        '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
        _ => return None,
    };
    char::from_digit(offset, 10)
}

/// Replace non-ASCII digits in a string, leaving everything else untouched
pub fn normalize_digits(text: &str) -> String {
    text.chars().map(|c| ascii_digit(c).unwrap_or(c)).collect()
}
