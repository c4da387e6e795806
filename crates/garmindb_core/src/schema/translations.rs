//! Column translations shared by schema entities.

use crate::model::field_map::{timestamp_value, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use std::path::Path;

const ACCEPTED_DATETIME_FORMATS: [&str; 4] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Reduces a text path to its final component; other values pass through.
pub fn file_name_from_path(value: Value) -> Value {
    match value {
        Value::Text(path) => match Path::new(&path).file_name() {
            Some(name) => Value::Text(name.to_string_lossy().into_owned()),
            None => Value::Text(path),
        },
        other => other,
    }
}

/// Rewrites timestamp text into the stored fixed-width encoding.
///
/// Accepts space or `T` separated date-times with optional fractional
/// seconds, and bare dates (midnight). Unparseable text and non-text values
/// pass through unchanged.
pub fn normalize_timestamp(value: Value) -> Value {
    let Value::Text(text) = value else {
        return value;
    };
    let trimmed = text.trim();
    let parsed = ACCEPTED_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });
    match parsed {
        Some(timestamp) => timestamp_value(timestamp),
        None => Value::Text(text),
    }
}

#[cfg(test)]
mod tests {
    use super::{file_name_from_path, normalize_timestamp};
    use rusqlite::types::Value;

    #[test]
    fn keeps_final_path_component() {
        assert_eq!(
            file_name_from_path(Value::Text("/home/me/FitFiles/Monitor/1234.fit".into())),
            Value::Text("1234.fit".into())
        );
        assert_eq!(
            file_name_from_path(Value::Text("plain.fit".into())),
            Value::Text("plain.fit".into())
        );
    }

    #[test]
    fn passes_through_non_text_and_rootless_paths() {
        assert_eq!(file_name_from_path(Value::Null), Value::Null);
        assert_eq!(
            file_name_from_path(Value::Integer(7)),
            Value::Integer(7)
        );
        assert_eq!(
            file_name_from_path(Value::Text("/".into())),
            Value::Text("/".into())
        );
    }

    #[test]
    fn normalizes_timestamp_text_to_fixed_width() {
        let expected = Value::Text("2024-05-01 00:00:00.000000".into());
        for input in [
            "2024-05-01 00:00:00",
            "2024-05-01T00:00:00",
            "2024-05-01 00:00:00.000000",
            "2024-05-01",
        ] {
            assert_eq!(normalize_timestamp(Value::Text(input.into())), expected, "{input}");
        }
        assert_eq!(
            normalize_timestamp(Value::Text("2024-05-01T07:30:15.5".into())),
            Value::Text("2024-05-01 07:30:15.500000".into())
        );
    }

    #[test]
    fn leaves_unparseable_and_non_text_timestamps() {
        assert_eq!(
            normalize_timestamp(Value::Text("yesterday".into())),
            Value::Text("yesterday".into())
        );
        assert_eq!(normalize_timestamp(Value::Null), Value::Null);
        assert_eq!(normalize_timestamp(Value::Integer(5)), Value::Integer(5));
    }
}
