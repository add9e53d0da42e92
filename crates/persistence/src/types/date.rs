//! Report date parsing and normalization.
//!
//! Upstream producers send report dates as `DD/MM/YYYY`. Storage keeps a
//! calendar date with no time component, written as an ISO 8601 `YYYY-MM-DD`
//! string where the store has no native date type. Documents written by older
//! producers may hold a timestamp instead, so reads accept several shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::ValidationError;

/// Format used by upstream producers.
pub const INPUT_DATE_FORMAT: &str = "%d/%m/%Y";

/// ISO 8601 calendar date format used for persisted dates.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a report date supplied with a new aggregate.
///
/// Accepts `DD/MM/YYYY` and ISO `YYYY-MM-DD`.
pub fn parse_report_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, INPUT_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, ISO_DATE_FORMAT))
        .map_err(|_| ValidationError::InvalidDate {
            value: value.to_string(),
        })
}

/// Renders a date the way it is persisted.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// Parses a persisted text date (ISO date, RFC 3339 timestamp or naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp).
pub fn parse_stored_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, ISO_DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

/// Normalizes a date field read from a document into a calendar date.
///
/// Handles ISO strings, RFC 3339 timestamps, epoch milliseconds and the
/// extended-JSON forms `{"$date": "<rfc3339>"}` and
/// `{"$date": {"$numberLong": "<millis>"}}` produced for native timestamps.
pub fn normalize_stored_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(text) => parse_stored_date(text),
        Value::Number(number) => number.as_i64().and_then(date_from_millis),
        Value::Object(map) => match map.get("$date")? {
            Value::Object(inner) => inner
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|millis| millis.parse::<i64>().ok())
                .and_then(date_from_millis),
            other => normalize_stored_date(other),
        },
        _ => None,
    }
}

fn date_from_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|timestamp| timestamp.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_report_date_day_first() {
        assert_eq!(parse_report_date("01/02/2024").unwrap(), date(2024, 2, 1));
        assert_eq!(parse_report_date(" 31/12/2023 ").unwrap(), date(2023, 12, 31));
    }

    #[test]
    fn test_parse_report_date_iso() {
        assert_eq!(parse_report_date("2024-02-01").unwrap(), date(2024, 2, 1));
    }

    #[test]
    fn test_parse_report_date_rejects_garbage() {
        assert!(parse_report_date("").is_err());
        assert!(parse_report_date("32/01/2024").is_err());
        assert!(parse_report_date("yesterday").is_err());
    }

    #[test]
    fn test_format_iso_date() {
        assert_eq!(format_iso_date(date(2024, 2, 1)), "2024-02-01");
    }

    #[test]
    fn test_normalize_string_forms() {
        assert_eq!(normalize_stored_date(&json!("2024-02-01")), Some(date(2024, 2, 1)));
        assert_eq!(
            normalize_stored_date(&json!("2024-02-01T00:00:00Z")),
            Some(date(2024, 2, 1))
        );
        assert_eq!(
            normalize_stored_date(&json!("2024-02-01T10:30:00")),
            Some(date(2024, 2, 1))
        );
    }

    #[test]
    fn test_normalize_native_timestamps() {
        // 2024-02-01T00:00:00Z
        let millis = 1_706_745_600_000_i64;
        assert_eq!(normalize_stored_date(&json!(millis)), Some(date(2024, 2, 1)));
        assert_eq!(
            normalize_stored_date(&json!({"$date": "2024-02-01T00:00:00Z"})),
            Some(date(2024, 2, 1))
        );
        assert_eq!(
            normalize_stored_date(&json!({"$date": {"$numberLong": millis.to_string()}})),
            Some(date(2024, 2, 1))
        );
    }

    #[test]
    fn test_normalize_unusable() {
        assert_eq!(normalize_stored_date(&Value::Null), None);
        assert_eq!(normalize_stored_date(&json!("not a date")), None);
        assert_eq!(normalize_stored_date(&json!({"other": 1})), None);
    }
}
