//! Loose value coercions shared by the built-in rules.
//!
//! Records arrive as JSON, so a field may hold a string, a number, a bool
//! or nothing at all. These helpers give every rule the same notion of
//! "empty", "numeric" and "date".

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Values a non-`required` rule lets through untested: null, `false`,
/// `""`, zero and NaN.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().is_none_or(|f| f == 0.0 || f.is_nan()),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Like [`is_falsy`] but a literal zero still counts as a value. Numeric
/// rules use this so `min:1` rejects `0`.
pub fn is_blank_non_zero(value: &Value) -> bool {
    is_falsy(value) && !matches!(value, Value::Number(n) if n.as_f64() == Some(0.0))
}

/// Text form of a value, as a form field would hold it.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Numeric conversion. Blank strings convert to zero, anything unparseable
/// (or a container) converts to `None`.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            match trimmed {
                "Infinity" | "+Infinity" => return Some(f64::INFINITY),
                "-Infinity" => return Some(f64::NEG_INFINITY),
                _ => {}
            }
            trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a calendar date or timestamp. Date-only values land on midnight.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date conversion for rule values. Numbers are epoch milliseconds.
pub fn value_to_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// Calendar date of a value, if it holds one.
pub fn value_to_date(value: &Value) -> Option<NaiveDate> {
    value_to_datetime(value).map(|dt| dt.date())
}
