//! Reading payload decoding
//!
//! Sensors publish JSON objects such as
//! `{"value": 51.2, "timestamp": "2024-01-01T00:00:00Z"}`. Field names are
//! matched in the lower camel and Pascal case spellings the devices use.
//! Timestamps without a zone designator are taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::Reading;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Reasons a feed message cannot become a [`Reading`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed reading payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid reading timestamp {0:?}")]
    Timestamp(String),
}

#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(alias = "Value")]
    value: f64,
    #[serde(alias = "timeStamp", alias = "TimeStamp")]
    timestamp: String,
}

/// Decode one feed message.
///
/// Both fields are required; a message missing either is rejected rather
/// than turned into a partially initialized reading.
pub fn decode_reading(payload: &[u8]) -> Result<Reading, DecodeError> {
    let raw: RawReading = serde_json::from_slice(payload)?;
    let timestamp = parse_timestamp(&raw.timestamp)?;
    Ok(Reading::new(raw.value, timestamp))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, DecodeError> {
    let text = text.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DecodeError::Timestamp(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_rfc3339_reading() {
        let reading =
            decode_reading(br#"{"value": 51.25, "timestamp": "2024-01-01T10:00:00+02:00"}"#)
                .unwrap();

        assert_eq!(reading.value, 51.25);
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_pascal_case_naive_timestamp_as_utc() {
        let reading =
            decode_reading(br#"{"Value": 7, "TimeStamp": "2019-05-04T13:14:15.5"}"#).unwrap();

        assert_eq!(reading.value, 7.0);
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2019, 5, 4, 13, 14, 15).unwrap()
                + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn test_decode_camel_case_timestamp_alias() {
        let reading =
            decode_reading(br#"{"value": -3.5, "timeStamp": "2020-02-02 02:02:02"}"#).unwrap();
        assert_eq!(reading.value, -3.5);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let err = decode_reading(br#"{"value": 1.0}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));

        let err = decode_reading(br#"{"timestamp": "2024-01-01T00:00:00Z"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let err = decode_reading(br#"{"value": "high", "timestamp": "2024-01-01T00:00:00Z"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let err = decode_reading(br#"{"value": 1.0, "timestamp": "yesterday"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Timestamp(ref t) if t == "yesterday"));
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        assert!(decode_reading(b"\xff\xfe not json").is_err());
        assert!(decode_reading(b"").is_err());
    }
}
