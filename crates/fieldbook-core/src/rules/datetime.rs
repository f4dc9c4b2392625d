//! Date and time answers
//!
//! Clients send ISO 8601 timestamps for both date and time inputs; the
//! display format only matters when two answers are compared.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::InputRule;
use crate::codes::ErrorCode;
use crate::definition::Input;

/// Display formats accepted for `date` inputs
pub const DATE_FORMATS: &[&str] = &["dd/MM/YYYY", "MM/dd/YYYY", "YYYY/MM/dd", "MM/YYYY", "dd/MM"];

/// Display formats accepted for `time` inputs
pub const TIME_FORMATS: &[&str] = &["HH:mm:ss", "hh:mm:ss", "HH:mm", "hh:mm", "mm:ss"];

/// Storage format for normalized answers
pub const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse any accepted timestamp shape, dropping the offset
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Translate a display format (`dd/MM/YYYY`) into a chrono format string
pub fn chrono_format(display: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("dd", "%d"),
        ("MM", "%m"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];

    let mut out = String::with_capacity(display.len() * 2);
    let mut rest = display;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// The value two answers are compared on when checking uniqueness
///
/// Falls back to the trimmed raw string when the answer does not parse or
/// no display format is configured.
pub fn format_for_comparison(raw: &str, display_format: Option<&str>) -> String {
    match (parse_timestamp(raw), display_format) {
        (Some(dt), Some(format)) => dt.format(&chrono_format(format)).to_string(),
        _ => raw.trim().to_string(),
    }
}

pub struct DatetimeRule;

impl InputRule for DatetimeRule {
    fn validate(&self, answer: &Value, _input: &Input) -> Result<Value, ErrorCode> {
        let raw = answer.as_str().ok_or(ErrorCode::AnswerDatetimeInvalid)?;
        let parsed = parse_timestamp(raw).ok_or(ErrorCode::AnswerDatetimeInvalid)?;
        Ok(Value::String(parsed.format(STORED_FORMAT).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::InputType;
    use serde_json::json;

    #[test]
    fn test_display_format_translation() {
        assert_eq!(chrono_format("dd/MM/YYYY"), "%d/%m/%Y");
        assert_eq!(chrono_format("hh:mm:ss"), "%I:%M:%S");
        assert_eq!(chrono_format("MM/YYYY"), "%m/%Y");

        let sample = parse_timestamp("2024-01-02T03:04:05").unwrap();
        for format in DATE_FORMATS.iter().chain(TIME_FORMATS) {
            let rendered = sample.format(&chrono_format(format)).to_string();
            assert!(rendered.chars().all(|c| c.is_ascii_digit() || c == '/' || c == ':'), "{}", rendered);
        }
    }

    #[test]
    fn test_normalization() {
        let input = Input::new("d", InputType::Date, "When").with_datetime_format("dd/MM/YYYY");
        assert_eq!(
            DatetimeRule.validate(&json!("2024-03-05T10:20:30.000Z"), &input),
            Ok(json!("2024-03-05T10:20:30.000"))
        );
        assert_eq!(DatetimeRule.validate(&json!("2024-03-05"), &input), Ok(json!("2024-03-05T00:00:00.000")));
        assert_eq!(DatetimeRule.validate(&json!("05/03/2024"), &input), Err(ErrorCode::AnswerDatetimeInvalid));
        assert_eq!(DatetimeRule.validate(&json!(12), &input), Err(ErrorCode::AnswerDatetimeInvalid));
    }

    #[test]
    fn test_comparison_uses_display_format() {
        // same day, different time of day: equal under a date-only format
        let a = format_for_comparison("2024-03-05T08:00:00.000", Some("dd/MM/YYYY"));
        let b = format_for_comparison("2024-03-05T17:45:00+02:00", Some("dd/MM/YYYY"));
        assert_eq!(a, b);

        let a = format_for_comparison("2024-03-05T08:15:00.000", Some("HH:mm"));
        let b = format_for_comparison("1970-01-01T08:15:59.000", Some("HH:mm"));
        assert_eq!(a, "08:15");
        assert_eq!(a, b);

        assert_ne!(
            format_for_comparison("2024-03-05T08:15:00.000", Some("HH:mm:ss")),
            format_for_comparison("2024-03-05T08:15:01.000", Some("HH:mm:ss"))
        );
    }
}
