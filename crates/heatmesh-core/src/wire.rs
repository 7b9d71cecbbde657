use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::frame::Frame;

/// The metrics a sample carries, keyed on the wire as `t`, `h`, `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
        }
    }

    pub fn field_key(&self) -> &'static str {
        match self {
            Metric::Temperature => "t",
            Metric::Humidity => "h",
            Metric::Pressure => "p",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "t" | "temp" | "temperature" => Ok(Metric::Temperature),
            "h" | "hum" | "humidity" => Ok(Metric::Humidity),
            "p" | "press" | "pressure" => Ok(Metric::Pressure),
            other => Err(format!("Unknown metric: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReading {
    #[serde(rename = "id")]
    pub device_id: String,
    #[serde(rename = "t")]
    pub temperature: f64,
    #[serde(rename = "h")]
    pub humidity: f64,
    #[serde(rename = "p")]
    pub pressure: f64,
}

impl SampleReading {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Pressure => self.pressure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayBoot {
    pub mac: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Sample(SampleReading),
    GatewayBoot(GatewayBoot),
    Unrecognized { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("field {field} must be a string")]
    ExpectedString { field: &'static str },
    #[error("field {field} must be a finite number, got {found}")]
    ExpectedNumber { field: &'static str, found: String },
}

/// Classifies one frame by its `type` field. Anything without a recognized
/// string `type` is a valid Unrecognized message, not an error; errors are
/// reserved for recognized types with broken required fields.
pub fn classify(frame: &Frame) -> Result<Message, ValidationError> {
    let Some(kind) = frame.value.get("type").and_then(Value::as_str) else {
        return Ok(Message::Unrecognized {
            raw: frame.raw.clone(),
        });
    };

    match kind {
        "sample" => Ok(Message::Sample(SampleReading {
            device_id: require_string(&frame.value, "id")?,
            temperature: require_finite(&frame.value, "t")?,
            humidity: require_finite(&frame.value, "h")?,
            pressure: require_finite(&frame.value, "p")?,
        })),
        "gateway_boot" => Ok(Message::GatewayBoot(GatewayBoot {
            mac: require_string(&frame.value, "mac")?,
            channel: lenient_channel(&frame.value),
        })),
        _ => Ok(Message::Unrecognized {
            raw: frame.raw.clone(),
        }),
    }
}

fn require_string(value: &Value, field: &'static str) -> Result<String, ValidationError> {
    match value.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(ValidationError::ExpectedString { field }),
        None => Err(ValidationError::MissingField { field }),
    }
}

// Firmware emits these as numbers, but older builds quoted them; accept
// both. A string that parses to NaN or infinity is still rejected so grid
// math only ever sees finite values.
fn require_finite(value: &Value, field: &'static str) -> Result<f64, ValidationError> {
    let Some(raw) = value.get(field) else {
        return Err(ValidationError::MissingField { field });
    };
    let parsed = match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(ValidationError::ExpectedNumber {
            field,
            found: raw.to_string(),
        }),
    }
}

// The boot banner's channel is informational; anything unusable degrades
// to absent instead of invalidating the whole message.
fn lenient_channel(value: &Value) -> Option<u16> {
    value
        .get("channel")
        .and_then(Value::as_u64)
        .and_then(|channel| u16::try_from(channel).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::extract_frames;
    use serde_json::json;

    fn classify_line(line: &str) -> Result<Message, ValidationError> {
        let frame = extract_frames(line).next().expect("one frame");
        classify(&frame)
    }

    #[test]
    fn sample_with_numeric_fields_classifies() {
        let message =
            classify_line(r#"{"type":"sample","id":"A1","t":21.5,"h":40,"p":1013.2}"#).expect("ok");
        assert_eq!(
            message,
            Message::Sample(SampleReading {
                device_id: "A1".to_string(),
                temperature: 21.5,
                humidity: 40.0,
                pressure: 1013.2,
            })
        );
    }

    #[test]
    fn sample_accepts_quoted_numbers() {
        let message =
            classify_line(r#"{"type":"sample","id":"B2","t":"19.25","h":"55","p":"1008"}"#)
                .expect("ok");
        let Message::Sample(reading) = message else {
            panic!("expected sample");
        };
        assert_eq!(reading.temperature, 19.25);
        assert_eq!(reading.humidity, 55.0);
        assert_eq!(reading.pressure, 1008.0);
    }

    #[test]
    fn sample_missing_field_is_rejected() {
        let err = classify_line(r#"{"type":"sample","id":"A1","t":21.5,"h":40}"#).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "p" });
    }

    #[test]
    fn sample_with_non_string_id_is_rejected() {
        let err = classify_line(r#"{"type":"sample","id":7,"t":1,"h":2,"p":3}"#).unwrap_err();
        assert_eq!(err, ValidationError::ExpectedString { field: "id" });
    }

    #[test]
    fn sample_with_boolean_metric_is_rejected() {
        let err = classify_line(r#"{"type":"sample","id":"A1","t":true,"h":2,"p":3}"#).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ExpectedNumber { field: "t", .. }
        ));
    }

    #[test]
    fn sample_with_nan_string_is_rejected() {
        let err =
            classify_line(r#"{"type":"sample","id":"A1","t":"NaN","h":2,"p":3}"#).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ExpectedNumber { field: "t", .. }
        ));
    }

    #[test]
    fn gateway_boot_with_channel() {
        let message =
            classify_line(r#"{"type":"gateway_boot","mac":"24:6F:28:AA:BB:CC","channel":6}"#)
                .expect("ok");
        assert_eq!(
            message,
            Message::GatewayBoot(GatewayBoot {
                mac: "24:6F:28:AA:BB:CC".to_string(),
                channel: Some(6),
            })
        );
    }

    #[test]
    fn gateway_boot_channel_degrades_to_none() {
        for line in [
            r#"{"type":"gateway_boot","mac":"AA"}"#,
            r#"{"type":"gateway_boot","mac":"AA","channel":"six"}"#,
            r#"{"type":"gateway_boot","mac":"AA","channel":-3}"#,
            r#"{"type":"gateway_boot","mac":"AA","channel":70000}"#,
        ] {
            let message = classify_line(line).expect("ok");
            assert_eq!(
                message,
                Message::GatewayBoot(GatewayBoot {
                    mac: "AA".to_string(),
                    channel: None,
                })
            );
        }
    }

    #[test]
    fn gateway_boot_without_mac_is_rejected() {
        let err = classify_line(r#"{"type":"gateway_boot","channel":6}"#).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "mac" });
    }

    #[test]
    fn unknown_and_missing_type_become_unrecognized() {
        for line in [
            r#"{"type":"debug","msg":"hi"}"#,
            r#"{"id":"A1","t":1}"#,
            r#"{"type":42}"#,
        ] {
            let message = classify_line(line).expect("ok");
            assert!(matches!(message, Message::Unrecognized { .. }));
        }
    }

    #[test]
    fn unrecognized_keeps_raw_text() {
        let message = classify_line(r#"{"type":"debug","msg":"hi"}"#).expect("ok");
        assert_eq!(
            message,
            Message::Unrecognized {
                raw: r#"{"type":"debug","msg":"hi"}"#.to_string(),
            }
        );
    }

    #[test]
    fn message_serializes_in_wire_shape() {
        let sample = Message::Sample(SampleReading {
            device_id: "A1".to_string(),
            temperature: 21.5,
            humidity: 40.0,
            pressure: 1013.0,
        });
        assert_eq!(
            serde_json::to_value(&sample).expect("serialize"),
            json!({"type":"sample","id":"A1","t":21.5,"h":40.0,"p":1013.0})
        );

        let boot = Message::GatewayBoot(GatewayBoot {
            mac: "AA".to_string(),
            channel: None,
        });
        assert_eq!(
            serde_json::to_value(&boot).expect("serialize"),
            json!({"type":"gateway_boot","mac":"AA"})
        );
    }

    #[test]
    fn metric_parses_short_and_long_names() {
        assert_eq!("t".parse::<Metric>().expect("t"), Metric::Temperature);
        assert_eq!(
            "Humidity".parse::<Metric>().expect("humidity"),
            Metric::Humidity
        );
        assert_eq!("press".parse::<Metric>().expect("press"), Metric::Pressure);
        assert!("watts".parse::<Metric>().is_err());
    }

    #[test]
    fn metric_display_matches_as_str() {
        assert_eq!(Metric::Temperature.to_string(), "temperature");
        assert_eq!(Metric::Pressure.field_key(), "p");
    }
}
