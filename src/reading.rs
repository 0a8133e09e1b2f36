//! Device readings and inbound queue message decoding.
//!
//! The producer publishes JSON objects such as
//! `{"device_id": "...", "timestamp": 1700000000000, "measurement_value": 0.25}`.
//! The value field is accepted as either `value` or `measurement_value`. When
//! both are present and non-null, `measurement_value` wins.

use std::sync::Arc;

use serde::Deserialize;

use crate::aggregator::checked_hour_start;

/// Result type for decoding.
pub type Result<T> = std::result::Result<T, ReadingError>;

/// Reasons a queue message is rejected as malformed.
#[derive(Debug, thiserror::Error)]
pub enum ReadingError {
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("device_id is empty")]
    EmptyDeviceId,

    #[error("Invalid value {0}: must be finite and non-negative")]
    InvalidValue(f64),

    #[error("Timestamp {0} has no representable hour bucket")]
    InvalidTimestamp(i64),
}

/// A single immutable reading from a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Producer-supplied milliseconds since the epoch.
    pub timestamp: i64,
    /// Opaque device identifier (UUID-shaped in practice).
    pub device_id: String,
    /// Non-negative reading value.
    pub value: f64,
}

impl Reading {
    pub fn new(device_id: impl Into<String>, timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            device_id: device_id.into(),
            value,
        }
    }
}

/// A decoded queue message.
///
/// `frame` is the received payload text, forwarded verbatim to live subscribers.
#[derive(Debug, Clone)]
pub struct ReadingMessage {
    pub reading: Reading,
    pub frame: Arc<str>,
}

#[derive(Deserialize)]
struct RawReading {
    timestamp: Option<i64>,
    device_id: Option<String>,
    measurement_value: Option<f64>,
    value: Option<f64>,
}

/// Decode a queue payload into a reading.
pub fn decode(payload: &[u8]) -> Result<ReadingMessage> {
    let text = std::str::from_utf8(payload)?;

    let json: serde_json::Value = serde_json::from_str(text)?;
    if !json.is_object() {
        return Err(ReadingError::NotAnObject);
    }
    let raw: RawReading = serde_json::from_value(json)?;

    let timestamp = raw.timestamp.ok_or(ReadingError::MissingField("timestamp"))?;
    let device_id = raw.device_id.ok_or(ReadingError::MissingField("device_id"))?;
    let value = raw
        .measurement_value
        .or(raw.value)
        .ok_or(ReadingError::MissingField("value"))?;

    if device_id.is_empty() {
        return Err(ReadingError::EmptyDeviceId);
    }
    if !value.is_finite() || value < 0.0 {
        return Err(ReadingError::InvalidValue(value));
    }
    if checked_hour_start(timestamp).is_none() {
        return Err(ReadingError::InvalidTimestamp(timestamp));
    }

    Ok(ReadingMessage {
        reading: Reading {
            timestamp,
            device_id,
            value,
        },
        frame: Arc::from(text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = "7f3c2a9e-5b1d-4c8e-9a0f-1d2e3f4a5b6c";

    #[test]
    fn test_decode_measurement_value_field() {
        let payload = format!(
            r#"{{"device_id":"{}","timestamp":1700000000000,"measurement_value":0.25}}"#,
            DEVICE
        );

        let message = decode(payload.as_bytes()).unwrap();

        assert_eq!(message.reading, Reading::new(DEVICE, 1_700_000_000_000, 0.25));
        assert_eq!(&*message.frame, payload);
    }

    #[test]
    fn test_decode_value_field() {
        let message = decode(br#"{"device_id":"A","timestamp":5,"value":1.5}"#).unwrap();
        assert_eq!(message.reading.value, 1.5);
    }

    #[test]
    fn test_decode_both_value_fields_prefers_measurement_value() {
        let message =
            decode(br#"{"device_id":"A","timestamp":5,"value":9.0,"measurement_value":0.5}"#)
                .unwrap();
        assert_eq!(message.reading.value, 0.5);

        let message =
            decode(br#"{"device_id":"A","timestamp":5,"measurement_value":null,"value":9.0}"#)
                .unwrap();
        assert_eq!(message.reading.value, 9.0);
    }

    #[test]
    fn test_decode_timestamp_without_hour_bucket() {
        let err = decode(br#"{"device_id":"A","timestamp":-9223372036854775808,"value":1.0}"#)
            .unwrap_err();
        assert!(matches!(err, ReadingError::InvalidTimestamp(i64::MIN)));

        let message = decode(br#"{"device_id":"A","timestamp":9223372036854775807,"value":1.0}"#)
            .unwrap();
        assert_eq!(message.reading.timestamp, i64::MAX);
    }

    #[test]
    fn test_decode_integer_value() {
        let message = decode(br#"{"device_id":"A","timestamp":5,"value":3}"#).unwrap();
        assert_eq!(message.reading.value, 3.0);
    }

    #[test]
    fn test_decode_keeps_extra_fields_in_frame() {
        let payload = br#"{"device_id":"A","timestamp":5,"value":1.0,"unit":"kWh"}"#;
        let message = decode(payload).unwrap();
        assert!(message.frame.contains(r#""unit":"kWh""#));
    }

    #[test]
    fn test_decode_missing_value() {
        let err = decode(br#"{"device_id":"A","timestamp":5}"#).unwrap_err();
        assert!(matches!(err, ReadingError::MissingField("value")));
    }

    #[test]
    fn test_decode_null_value() {
        let err = decode(br#"{"device_id":"A","timestamp":5,"value":null}"#).unwrap_err();
        assert!(matches!(err, ReadingError::MissingField("value")));
    }

    #[test]
    fn test_decode_missing_timestamp() {
        let err = decode(br#"{"device_id":"A","value":1.0}"#).unwrap_err();
        assert!(matches!(err, ReadingError::MissingField("timestamp")));
    }

    #[test]
    fn test_decode_missing_device() {
        let err = decode(br#"{"timestamp":5,"value":1.0}"#).unwrap_err();
        assert!(matches!(err, ReadingError::MissingField("device_id")));
    }

    #[test]
    fn test_decode_empty_device() {
        let err = decode(br#"{"device_id":"","timestamp":5,"value":1.0}"#).unwrap_err();
        assert!(matches!(err, ReadingError::EmptyDeviceId));
    }

    #[test]
    fn test_decode_negative_value() {
        let err = decode(br#"{"device_id":"A","timestamp":5,"value":-0.5}"#).unwrap_err();
        assert!(matches!(err, ReadingError::InvalidValue(_)));
    }

    #[test]
    fn test_decode_wrong_types() {
        assert!(decode(br#"{"device_id":"A","timestamp":"noon","value":1.0}"#).is_err());
        assert!(decode(br#"{"device_id":"A","timestamp":5,"value":"high"}"#).is_err());
        assert!(decode(br#"{"device_id":7,"timestamp":5,"value":1.0}"#).is_err());
    }

    #[test]
    fn test_decode_not_an_object() {
        let err = decode(br#"["A", 5, 1.0]"#).unwrap_err();
        assert!(matches!(err, ReadingError::NotAnObject));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode(b"not json"), Err(ReadingError::Json(_))));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(ReadingError::Utf8(_))));
    }
}
