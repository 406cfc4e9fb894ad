//! FHIR R4 Observation assembly
//!
//! Builds Observation resources from telemetry readings and JSON Patch
//! documents for updating an existing Observation's value.
//!
//! Resources carry no server-assigned id and no wall-clock fields, so the same
//! inputs always serialize to the same bytes.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::coding::{self, CodingDescriptor};
use crate::error::{AppError, AppResult};
use crate::models::{ClinicalContext, TelemetryReading};

/// JSON Pointer to an Observation's numeric value
pub const VALUE_QUANTITY_PATH: &str = "/valueQuantity/value";

pub const OBSERVATION_RESOURCE_TYPE: &str = "Observation";
pub const FINAL_STATUS: &str = "final";

/// FHIR R4 Observation resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirObservation {
    /// Resource type (always "Observation")
    pub resource_type: String,

    /// Observation status (always "final" for device telemetry)
    pub status: String,

    /// Code describing what was observed
    pub code: FhirCodeableConcept,

    /// Patient the observation is about
    pub subject: FhirReference,

    /// Encounter during which the observation was made
    pub encounter: FhirReference,

    /// Time of the observation, as reported by the device platform
    pub effective_date_time: String,

    /// The observed value
    pub value_quantity: FhirQuantity,
}

/// FHIR codeable concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirCodeableConcept {
    pub coding: Vec<FhirCoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// FHIR coding element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirCoding {
    pub system: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl From<&CodingDescriptor> for FhirCoding {
    fn from(descriptor: &CodingDescriptor) -> Self {
        Self {
            system: descriptor.system.to_string(),
            code: descriptor.code.to_string(),
            display: Some(descriptor.display.to_string()),
        }
    }
}

/// FHIR reference to another resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirReference {
    pub reference: String,
}

/// FHIR quantity value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirQuantity {
    pub value: Number,
    pub unit: String,
}

/// JSON Patch operation kinds used against the FHIR store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
}

/// Single JSON Patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Number,
}

/// JSON Patch document, serialized as a bare array of operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchDocument(pub Vec<PatchOperation>);

/// Build one Observation for a single telemetry reading
///
/// Units always come from the coding table; a unit reported by the device is
/// never consulted.
pub fn build_observation(
    timestamp: &str,
    reading: &TelemetryReading,
    context: &ClinicalContext,
) -> AppResult<FhirObservation> {
    check_timestamp(timestamp)?;
    check_context(context)?;

    let descriptor = coding::resolve(&reading.capability)?;
    let value = reading.value.as_number(&reading.capability)?;

    Ok(FhirObservation {
        resource_type: OBSERVATION_RESOURCE_TYPE.to_string(),
        status: FINAL_STATUS.to_string(),
        code: FhirCodeableConcept {
            coding: vec![FhirCoding::from(descriptor)],
            text: Some(descriptor.display.to_string()),
        },
        subject: FhirReference {
            reference: format!("Patient/{}", context.patient_id),
        },
        encounter: FhirReference {
            reference: format!("Encounter/{}", context.encounter_id),
        },
        effective_date_time: timestamp.to_string(),
        value_quantity: FhirQuantity {
            value,
            unit: descriptor.unit.to_string(),
        },
    })
}

/// A blank or whitespace-only timestamp counts as missing
pub fn check_timestamp(timestamp: &str) -> AppResult<()> {
    if timestamp.trim().is_empty() {
        return Err(AppError::malformed("timestamp", "must not be empty"));
    }
    Ok(())
}

/// Both subject and encounter identifiers must be present
pub fn check_context(context: &ClinicalContext) -> AppResult<()> {
    if context.patient_id.trim().is_empty() {
        return Err(AppError::MissingContext("patientId".to_string()));
    }
    if context.encounter_id.trim().is_empty() {
        return Err(AppError::MissingContext("encounterId".to_string()));
    }
    Ok(())
}

/// Build a single-operation patch replacing the value at `field_path`
pub fn build_patch(field_path: &str, value: Number) -> PatchDocument {
    PatchDocument(vec![PatchOperation {
        op: PatchOp::Replace,
        path: field_path.to_string(),
        value,
    }])
}
