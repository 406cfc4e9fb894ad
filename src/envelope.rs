//! Device envelope extraction
//!
//! Pulls telemetry, clinical context and the event timestamp out of the JSON
//! envelope the IoT platform delivers for a device event:
//!
//! ```json
//! {
//!   "timestamp": "2023-01-01T00:00:00Z",
//!   "device": {
//!     "telemetry": { "hr": { "value": 72 } },
//!     "cloudProperties": {
//!       "patientId": { "value": "P1" },
//!       "encounterId": { "value": "E1" }
//!     }
//!   }
//! }
//! ```

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{ClinicalContext, TelemetryReading, TelemetryValue};

pub const TELEMETRY_PATH: &str = "device.telemetry";
pub const CLOUD_PROPERTIES_PATH: &str = "device.cloudProperties";

const PATIENT_ID: &str = "patientId";
const ENCOUNTER_ID: &str = "encounterId";

/// Flatten `device.telemetry.<capability>.value` into readings
pub fn extract_telemetry(envelope: &Value) -> AppResult<Vec<TelemetryReading>> {
    let telemetry = section(envelope, "telemetry", TELEMETRY_PATH)?;

    let mut readings = Vec::with_capacity(telemetry.len());
    for (capability, entry) in telemetry {
        let field = format!("{TELEMETRY_PATH}.{capability}");
        let value = match entry_value(entry, &field)? {
            Value::Number(n) => TelemetryValue::Number(n.clone()),
            Value::String(s) => TelemetryValue::Text(s.clone()),
            other => {
                return Err(AppError::malformed(
                    format!("{field}.value"),
                    format!("expected a number or string, found {}", json_type(other)),
                ))
            }
        };
        readings.push(TelemetryReading::new(capability.clone(), value));
    }

    debug!(count = readings.len(), "Extracted telemetry readings");
    Ok(readings)
}

/// Read patient and encounter identifiers from `device.cloudProperties`
pub fn extract_context(envelope: &Value) -> AppResult<ClinicalContext> {
    let properties = section(envelope, "cloudProperties", CLOUD_PROPERTIES_PATH)?;

    Ok(ClinicalContext {
        patient_id: context_id(properties, PATIENT_ID)?,
        encounter_id: context_id(properties, ENCOUNTER_ID)?,
    })
}

/// Top-level event timestamp, verbatim
pub fn extract_timestamp(envelope: &Value) -> AppResult<String> {
    match envelope.get("timestamp") {
        Some(Value::String(ts)) if !ts.trim().is_empty() => Ok(ts.clone()),
        Some(Value::String(_)) => Err(AppError::malformed("timestamp", "must not be empty")),
        Some(other) => Err(AppError::malformed(
            "timestamp",
            format!("expected a string, found {}", json_type(other)),
        )),
        None => Err(AppError::malformed("timestamp", "missing")),
    }
}

fn section<'a>(envelope: &'a Value, name: &str, path: &str) -> AppResult<&'a Map<String, Value>> {
    let device = envelope
        .get("device")
        .ok_or_else(|| AppError::malformed("device", "missing"))?
        .as_object()
        .ok_or_else(|| AppError::malformed("device", "expected an object"))?;

    device
        .get(name)
        .ok_or_else(|| AppError::malformed(path, "missing"))?
        .as_object()
        .ok_or_else(|| AppError::malformed(path, "expected an object of named entries"))
}

fn entry_value<'a>(entry: &'a Value, field: &str) -> AppResult<&'a Value> {
    entry
        .as_object()
        .ok_or_else(|| AppError::malformed(field, "expected an object"))?
        .get("value")
        .ok_or_else(|| AppError::malformed(field, "entry has no 'value'"))
}

fn context_id(properties: &Map<String, Value>, name: &str) -> AppResult<String> {
    let field = format!("{CLOUD_PROPERTIES_PATH}.{name}");
    let entry = properties
        .get(name)
        .ok_or_else(|| AppError::MissingContext(field.clone()))?;

    match entry_value(entry, &field)? {
        Value::String(id) if !id.trim().is_empty() => Ok(id.clone()),
        Value::String(_) | Value::Null => Err(AppError::MissingContext(field)),
        other => Err(AppError::malformed(
            format!("{field}.value"),
            format!("expected a string, found {}", json_type(other)),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Number};

    fn envelope() -> Value {
        json!({
            "timestamp": "2023-01-01T00:00:00Z",
            "device": {
                "telemetry": {
                    "hr": { "value": 72 },
                    "spo2": { "value": 98 }
                },
                "cloudProperties": {
                    "patientId": { "value": "P1" },
                    "encounterId": { "value": "E1" }
                }
            }
        })
    }

    #[test]
    fn test_extract_telemetry() {
        let readings = extract_telemetry(&envelope()).unwrap();

        assert_eq!(
            readings,
            vec![
                TelemetryReading::new("hr", TelemetryValue::Number(Number::from(72))),
                TelemetryReading::new("spo2", TelemetryValue::Number(Number::from(98))),
            ]
        );
    }

    #[test]
    fn test_telemetry_preserves_string_values() {
        let mut env = envelope();
        env["device"]["telemetry"]["mode"] = json!({ "value": "resting" });

        let readings = extract_telemetry(&env).unwrap();
        let mode = readings.iter().find(|r| r.capability == "mode").unwrap();

        assert_eq!(mode.value, TelemetryValue::Text("resting".to_string()));
    }

    #[test]
    fn test_empty_telemetry_is_valid() {
        let mut env = envelope();
        env["device"]["telemetry"] = json!({});

        assert!(extract_telemetry(&env).unwrap().is_empty());
    }

    #[test]
    fn test_missing_telemetry_section() {
        let mut env = envelope();
        env["device"].as_object_mut().unwrap().remove("telemetry");

        let err = extract_telemetry(&env).unwrap_err();
        assert_eq!(err, AppError::malformed("device.telemetry", "missing"));
    }

    #[test]
    fn test_telemetry_not_an_object() {
        let mut env = envelope();
        env["device"]["telemetry"] = json!([72, 98]);

        assert!(matches!(
            extract_telemetry(&env),
            Err(AppError::MalformedEnvelope { field, .. }) if field == "device.telemetry"
        ));
    }

    #[test]
    fn test_telemetry_entry_without_value() {
        let mut env = envelope();
        env["device"]["telemetry"]["hr"] = json!({ "reading": 72 });

        assert!(matches!(
            extract_telemetry(&env),
            Err(AppError::MalformedEnvelope { field, .. }) if field == "device.telemetry.hr"
        ));
    }

    #[test]
    fn test_telemetry_value_of_wrong_type() {
        let mut env = envelope();
        env["device"]["telemetry"]["hr"] = json!({ "value": [72] });

        assert!(matches!(
            extract_telemetry(&env),
            Err(AppError::MalformedEnvelope { field, .. }) if field == "device.telemetry.hr.value"
        ));
    }

    #[test]
    fn test_missing_device() {
        let err = extract_telemetry(&json!({ "timestamp": "t" })).unwrap_err();
        assert_eq!(err, AppError::malformed("device", "missing"));
    }

    #[test]
    fn test_extract_context() {
        let context = extract_context(&envelope()).unwrap();
        assert_eq!(context, ClinicalContext::new("P1", "E1"));
    }

    #[test]
    fn test_missing_cloud_properties() {
        let mut env = envelope();
        env["device"].as_object_mut().unwrap().remove("cloudProperties");

        assert!(matches!(
            extract_context(&env),
            Err(AppError::MalformedEnvelope { field, .. }) if field == "device.cloudProperties"
        ));
    }

    #[test]
    fn test_missing_patient_id() {
        let mut env = envelope();
        env["device"]["cloudProperties"]
            .as_object_mut()
            .unwrap()
            .remove("patientId");

        assert_eq!(
            extract_context(&env).unwrap_err(),
            AppError::MissingContext("device.cloudProperties.patientId".to_string())
        );
    }

    #[test]
    fn test_blank_encounter_id() {
        let mut env = envelope();
        env["device"]["cloudProperties"]["encounterId"] = json!({ "value": "  " });

        assert_eq!(
            extract_context(&env).unwrap_err(),
            AppError::MissingContext("device.cloudProperties.encounterId".to_string())
        );
    }

    #[test]
    fn test_context_entry_without_value() {
        let mut env = envelope();
        env["device"]["cloudProperties"]["patientId"] = json!({ "id": "P1" });

        assert!(matches!(
            extract_context(&env),
            Err(AppError::MalformedEnvelope { field, .. })
                if field == "device.cloudProperties.patientId"
        ));
    }

    #[test]
    fn test_extract_timestamp() {
        assert_eq!(extract_timestamp(&envelope()).unwrap(), "2023-01-01T00:00:00Z");

        let mut env = envelope();
        env["timestamp"] = json!(1672531200);
        assert!(extract_timestamp(&env).is_err());

        env.as_object_mut().unwrap().remove("timestamp");
        assert_eq!(
            extract_timestamp(&env).unwrap_err(),
            AppError::malformed("timestamp", "missing")
        );
    }

    #[test]
    fn test_blank_timestamp() {
        let mut env = envelope();
        env["timestamp"] = json!("   ");

        assert_eq!(
            extract_timestamp(&env).unwrap_err(),
            AppError::malformed("timestamp", "must not be empty")
        );
    }
}
