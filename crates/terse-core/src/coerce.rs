//! Raw-token classification.
//!
//! An unquoted token may stand for null, a bool, an integer, a float, or
//! an RFC3339 timestamp; anything else stays a string. Numeric tokens must
//! start with a digit, which is what lets quoted forms like `"true"` or
//! `"1"` opt out of coercion entirely.

use chrono::{DateTime, Utc};

use crate::value::Value;

/// True when the token is date-like enough to attempt an RFC3339 parse:
/// at least ten bytes, digits at offsets 0 and 3, dashes at 4 and 7.
fn looks_like_timestamp(s: &str) -> bool {
    let b = s.as_bytes();
    s.len() >= 10
        && b[0].is_ascii_digit()
        && b[3].is_ascii_digit()
        && b[4] == b'-'
        && b[7] == b'-'
}

/// Cheap predicate form of [`coerce`]: would this token be reinterpreted
/// as a non-string value? Used to decide whether a quoted key must stay
/// wrapped in quotes inside a canonical path.
pub fn can_coerce(value: &str) -> bool {
    value == "null"
        || value == "true"
        || value == "false"
        || looks_like_timestamp(value)
        || value.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

/// Classify a trimmed token. Returns `None` when the token is not one of
/// the recognized forms and the caller should keep the raw string.
pub fn coerce(value: &str) -> Option<Value> {
    match value {
        "null" => return Some(Value::Null),
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }

    if looks_like_timestamp(value) {
        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Some(Value::Timestamp(ts.with_timezone(&Utc)));
        }
        return None;
    }

    if value.bytes().next().is_some_and(|b| b.is_ascii_digit()) {
        let is_float = value.bytes().any(|b| b == b'.' || b == b'e' || b == b'E');
        if is_float {
            if let Ok(f) = value.parse::<f64>() {
                return Some(Value::Float(f));
            }
        } else if let Ok(i) = value.parse::<i64>() {
            return Some(Value::Int(i));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn keywords() {
        assert_eq!(coerce("null"), Some(Value::Null));
        assert_eq!(coerce("true"), Some(Value::Bool(true)));
        assert_eq!(coerce("false"), Some(Value::Bool(false)));
    }

    #[test]
    fn numbers() {
        assert_eq!(coerce("1"), Some(Value::Int(1)));
        assert_eq!(coerce("1.5"), Some(Value::Float(1.5)));
        assert_eq!(coerce("1e+4"), Some(Value::Float(10000.0)));
        // Numeric tokens must lead with a digit.
        assert_eq!(coerce("-1"), None);
        assert_eq!(coerce("abc"), None);
    }

    #[test]
    fn timestamps() {
        let expected = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(
            coerce("2020-01-01T12:00:00Z"),
            Some(Value::Timestamp(expected))
        );
        // Date-like but malformed: not coerced.
        assert_eq!(coerce("2020-01-99T99:00:00Z"), None);
    }

    #[test]
    fn predicate_matches_classifier() {
        for token in ["null", "true", "false", "12", "1.5", "2020-01-01T12:00:00Z"] {
            assert!(can_coerce(token), "{token}");
        }
        for token in ["hello", "-1", "", "@file", "%aGk="] {
            assert!(!can_coerce(token), "{token}");
        }
    }
}
