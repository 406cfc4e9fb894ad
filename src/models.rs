//! Data models for telemetry readings and related structures
//!
//! Defines the core data structures used throughout the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Raw binary payload as delivered by the radio network, keyed by its port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkFrame {
    pub port: u8,
    pub payload: Vec<u8>,
}

impl UplinkFrame {
    pub fn new(port: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            port,
            payload: payload.into(),
        }
    }
}

/// Raw value reported for a capability, with its JSON type preserved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(Number),
    Text(String),
}

impl TelemetryValue {
    /// Whole numbers are carried as JSON integers so they serialize as `72`, not `72.0`
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Some(TelemetryValue::Number(Number::from(value as i64)));
        }
        Number::from_f64(value).map(TelemetryValue::Number)
    }

    /// Numeric view of the value; numeric strings are accepted
    pub fn as_number(&self, capability: &str) -> AppResult<Number> {
        match self {
            TelemetryValue::Number(n) => Ok(n.clone()),
            TelemetryValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(TelemetryValue::from_f64)
                .and_then(|v| match v {
                    TelemetryValue::Number(n) => Some(n),
                    TelemetryValue::Text(_) => None,
                })
                .ok_or_else(|| {
                    AppError::malformed(
                        format!("device.telemetry.{capability}.value"),
                        format!("'{text}' is not a numeric value"),
                    )
                }),
        }
    }
}

/// One capability measurement extracted from an envelope or decoded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub capability: String,
    pub value: TelemetryValue,
}

impl TelemetryReading {
    pub fn new(capability: impl Into<String>, value: TelemetryValue) -> Self {
        Self {
            capability: capability.into(),
            value,
        }
    }
}

/// Subject and encounter an observation belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalContext {
    pub patient_id: String,
    pub encounter_id: String,
}

impl ClinicalContext {
    pub fn new(patient_id: impl Into<String>, encounter_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            encounter_id: encounter_id.into(),
        }
    }
}

/// Input DTO for binary uplink decoding
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecodeRequest {
    pub port: u8,

    #[validate(length(max = 242, message = "Payload exceeds the maximum uplink size"))]
    pub payload: Vec<u8>,
}

/// Input DTO for binary uplink ingestion
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UplinkRequest {
    pub port: u8,

    #[validate(length(max = 242, message = "Payload exceeds the maximum uplink size"))]
    pub payload: Vec<u8>,

    /// Blank timestamps and identifiers are rejected by the ingest service
    pub timestamp: String,
    pub patient_id: String,
    pub encounter_id: String,
}

impl UplinkRequest {
    pub fn frame(&self) -> UplinkFrame {
        UplinkFrame::new(self.port, self.payload.clone())
    }

    pub fn context(&self) -> ClinicalContext {
        ClinicalContext::new(self.patient_id.clone(), self.encounter_id.clone())
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub capabilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_number_stays_integer() {
        let value = TelemetryValue::from_f64(72.0).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "72");
    }

    #[test]
    fn test_fractional_number_kept() {
        let value = TelemetryValue::from_f64(36.46).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "36.46");
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(TelemetryValue::from_f64(f64::NAN).is_none());
        assert!(TelemetryValue::from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn test_telemetry_value_keeps_json_type() {
        let number: TelemetryValue = serde_json::from_str("98").unwrap();
        let text: TelemetryValue = serde_json::from_str("\"98\"").unwrap();

        assert_eq!(number, TelemetryValue::Number(Number::from(98)));
        assert_eq!(text, TelemetryValue::Text("98".to_string()));
    }

    #[test]
    fn test_numeric_string_accepted() {
        let value = TelemetryValue::Text(" 80 ".to_string());
        assert_eq!(value.as_number("hr").unwrap(), Number::from(80));
    }

    #[test]
    fn test_non_numeric_string_rejected() {
        let value = TelemetryValue::Text("high".to_string());
        let err = value.as_number("hr").unwrap_err();

        match err {
            AppError::MalformedEnvelope { field, .. } => {
                assert_eq!(field, "device.telemetry.hr.value")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_uplink_request_validation() {
        let valid = UplinkRequest {
            port: 1,
            payload: vec![98, 72, 0x0E, 0x3E],
            timestamp: "2023-01-01T00:00:00Z".to_string(),
            patient_id: "P1".to_string(),
            encounter_id: "E1".to_string(),
        };
        assert!(valid.validate().is_ok());

        let mut oversized = valid;
        oversized.payload = vec![0; 300];
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_uplink_request_camel_case() {
        let request: UplinkRequest = serde_json::from_str(
            r#"{"port":1,"payload":[1,2,3,4],"timestamp":"t","patientId":"P1","encounterId":"E1"}"#,
        )
        .unwrap();

        assert_eq!(request.context(), ClinicalContext::new("P1", "E1"));
        assert_eq!(request.frame(), UplinkFrame::new(1, vec![1, 2, 3, 4]));
    }
}
