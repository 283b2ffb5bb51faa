//! Cell values
//!
//! A record field is a scalar: a number or a string. Dates travel as ISO
//! strings and are parsed on demand, so an unparsable date is still a value
//! (it just never satisfies a date predicate and sorts last).

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Scalar value stored in a record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Text(String::new())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl Value {
    /// Empty text or a non-finite number
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Number(n) => !n.is_finite(),
            Value::Text(s) => s.trim().is_empty(),
        }
    }

    /// Display text (numbers without trailing ".0")
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Numeric view. NaN/infinite and unparsable text are missing.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Number(_) => None,
            Value::Text(s) => parse_number(s),
        }
    }

    /// Date view, parsed from ISO text
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => parse_datetime(s),
        }
    }
}

/// Format a number the way a grid cell shows it: integers without a
/// fractional part, everything else with Rust's shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Lenient number parse for user and file input.
///
/// Accepts surrounding whitespace, one leading currency symbol, thousands
/// separators and a trailing percent sign: `" $1,250.50 "`, `"12.5%"`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let negative = s.starts_with('-');
    if negative {
        s = s[1..].trim_start();
    }
    for symbol in ['$', '€', '£', '₹'] {
        if let Some(rest) = s.strip_prefix(symbol) {
            s = rest.trim_start();
            break;
        }
    }
    if let Some(rest) = s.strip_suffix('%') {
        s = rest.trim_end();
    }

    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let n: f64 = cleaned.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    Some(if negative { -n } else { n })
}

/// Parse an ISO date or date-time.
///
/// Plain dates map to midnight. Offsets in RFC 3339 input are normalised to
/// UTC so instants from different zones compare correctly.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    None
}

/// Calendar date of an ISO date or date-time
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}
