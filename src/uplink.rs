//! Binary uplink decoder
//!
//! Decodes fixed-layout LoRaWAN payloads from the wearable into named
//! physiological fields.
//!
//! Port 1 layout (4 bytes, big-endian):
//! - byte 0: oxygen saturation in percent (`spo2`)
//! - byte 1: heart rate in beats per minute (`hr`)
//! - bytes 2-3: device temperature in hundredths of a degree (`devtemp`)
//!
//! The hardware does not report battery voltage, so port 1 always carries a
//! placeholder `voltage` of 3000 mV. Frames on any other port decode to an
//! empty field set.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::{TelemetryReading, TelemetryValue, UplinkFrame};

/// Decoded field name to numeric value, ordered by field name
pub type DecodedFields = BTreeMap<String, f64>;

/// Port carrying the vitals frame
pub const VITALS_PORT: u8 = 1;

/// Minimum payload length for the vitals frame
pub const VITALS_FRAME_LEN: usize = 4;

/// Battery voltage reported in place of a real measurement (millivolts)
pub const PLACEHOLDER_VOLTAGE_MV: f64 = 3000.0;

pub mod fields {
    pub const SPO2: &str = "spo2";
    pub const HEART_RATE: &str = "hr";
    pub const DEVICE_TEMPERATURE: &str = "devtemp";
    pub const VOLTAGE: &str = "voltage";
}

/// Decode an uplink frame into its semantic fields
pub fn decode(frame: &UplinkFrame) -> AppResult<DecodedFields> {
    match frame.port {
        VITALS_PORT => decode_vitals(&frame.payload),
        port => {
            debug!(port, len = frame.payload.len(), "No layout for uplink port");
            Ok(DecodedFields::new())
        }
    }
}

fn decode_vitals(payload: &[u8]) -> AppResult<DecodedFields> {
    if payload.len() < VITALS_FRAME_LEN {
        warn!(
            expected = VITALS_FRAME_LEN,
            actual = payload.len(),
            "Short vitals frame"
        );
        return Err(AppError::ShortFrame {
            port: VITALS_PORT,
            expected: VITALS_FRAME_LEN,
            actual: payload.len(),
        });
    }

    let raw_temperature = u16::from_be_bytes([payload[2], payload[3]]);

    let mut decoded = DecodedFields::new();
    decoded.insert(fields::SPO2.to_string(), f64::from(payload[0]));
    decoded.insert(fields::HEART_RATE.to_string(), f64::from(payload[1]));
    decoded.insert(
        fields::DEVICE_TEMPERATURE.to_string(),
        f64::from(raw_temperature) / 100.0,
    );
    decoded.insert(fields::VOLTAGE.to_string(), PLACEHOLDER_VOLTAGE_MV);

    debug!(?decoded, "Decoded vitals frame");
    Ok(decoded)
}

/// Turn decoded fields into readings for the observation pipeline
pub fn into_readings(fields: DecodedFields) -> Vec<TelemetryReading> {
    fields
        .into_iter()
        .filter_map(|(name, value)| {
            TelemetryValue::from_f64(value).map(|value| TelemetryReading::new(name, value))
        })
        .collect()
}
