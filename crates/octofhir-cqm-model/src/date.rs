//! Lenient date parsing for record fields
//!
//! Dates on records come from many sources. A field that cannot be read as a
//! date is treated as absent rather than failing the whole snapshot.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a date from `YYYY-MM-DD`, an RFC 3339 date-time or a naive date-time
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    None
}

/// `deserialize_with` target for `Option<NaiveDate>` fields. Values that are
/// not strings (numbers, objects) are dropped like unparseable strings.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => {
            let parsed = parse_date(&value);
            if parsed.is_none() && !value.trim().is_empty() {
                warn!("Ignoring unparseable date '{}'", value);
            }
            parsed
        }
        Some(other) => {
            warn!("Ignoring non-string date {}", other);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-03-01", Some((2024, 3, 1)))]
    #[case("2024-03-01T10:15:00Z", Some((2024, 3, 1)))]
    #[case("2024-03-01T23:15:00-05:00", Some((2024, 3, 1)))]
    #[case("2024-03-01T10:15:00.123", Some((2024, 3, 1)))]
    #[case("2024-03-01 10:15:00", Some((2024, 3, 1)))]
    #[case("", None)]
    #[case("   ", None)]
    #[case("03/01/2024", None)]
    #[case("2024-02-30", None)]
    fn test_parse_date(#[case] raw: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(parse_date(raw), expected);
    }

    #[derive(Debug, Deserialize)]
    struct Dated {
        #[serde(default, deserialize_with = "deserialize")]
        on: Option<NaiveDate>,
    }

    #[rstest]
    #[case(r#"{"on": "2024-03-01"}"#, true)]
    #[case(r#"{"on": 20240301}"#, false)]
    #[case(r#"{"on": {"year": 2024}}"#, false)]
    #[case(r#"{"on": ["2024-03-01"]}"#, false)]
    #[case(r#"{"on": null}"#, false)]
    #[case(r#"{}"#, false)]
    fn test_any_json_value_is_accepted(#[case] json: &str, #[case] dated: bool) {
        let parsed: Dated = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.on.is_some(), dated);
    }
}
