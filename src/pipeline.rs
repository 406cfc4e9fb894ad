//! Observation ingestion pipeline
//!
//! Flow for one submission:
//! 1. Extract timestamp, clinical context and readings (envelope) or decode
//!    the binary frame (uplink). Any failure here rejects the submission.
//! 2. For every reading, resolve its coding and assemble an Observation.
//! 3. Submit each Observation to the repository as an independent unit.
//! 4. Report the outcome per capability.
//!
//! Per-capability failures (unknown capability, non-numeric value, store
//! rejection) never abort sibling submissions.

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Number, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::coding;
use crate::envelope;
use crate::error::{AppError, AppResult};
use crate::fhir::{self, VALUE_QUANTITY_PATH};
use crate::gateway::ObservationRepository;
use crate::models::{ClinicalContext, TelemetryReading, UplinkFrame};
use crate::uplink;
use crate::validation::validate_resource_id;

/// Result of submitting one capability
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Stored; `resource` is what the store returned
    Created { resource: Value },
    Failed {
        error_type: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityOutcome {
    pub capability: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl CapabilityOutcome {
    fn from_result(capability: &str, result: AppResult<Value>) -> Self {
        let outcome = match result {
            Ok(resource) => Outcome::Created { resource },
            Err(err) => Outcome::Failed {
                error_type: err.kind(),
                message: err.to_string(),
            },
        };

        Self {
            capability: capability.to_string(),
            outcome,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self.outcome, Outcome::Created { .. })
    }
}

/// Per-capability results for one submission, in reading order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub outcomes: Vec<CapabilityOutcome>,
}

impl SubmissionReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &CapabilityOutcome> {
        self.outcomes.iter().filter(|o| o.is_created())
    }

    pub fn failed(&self) -> impl Iterator<Item = &CapabilityOutcome> {
        self.outcomes.iter().filter(|o| !o.is_created())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(CapabilityOutcome::is_created)
    }

    #[cfg(test)]
    pub fn get(&self, capability: &str) -> Option<&CapabilityOutcome> {
        self.outcomes.iter().find(|o| o.capability == capability)
    }
}

/// Turns device telemetry into stored Observations
pub struct IngestService {
    repository: Arc<dyn ObservationRepository>,
}

impl IngestService {
    pub fn new(repository: Arc<dyn ObservationRepository>) -> Self {
        Self { repository }
    }

    /// Create one Observation per capability in a device envelope
    #[instrument(skip_all)]
    pub async fn submit_envelope(&self, envelope: &Value) -> AppResult<SubmissionReport> {
        let timestamp = envelope::extract_timestamp(envelope)?;
        let context = envelope::extract_context(envelope)?;
        let readings = envelope::extract_telemetry(envelope)?;

        Ok(self.submit_readings(&timestamp, &context, readings).await)
    }

    /// Decode a binary uplink and create one Observation per decoded field
    #[instrument(skip(self, frame, context), fields(port = frame.port))]
    pub async fn submit_uplink(
        &self,
        frame: &UplinkFrame,
        timestamp: &str,
        context: &ClinicalContext,
    ) -> AppResult<SubmissionReport> {
        fhir::check_timestamp(timestamp)?;
        fhir::check_context(context)?;
        let readings = uplink::into_readings(uplink::decode(frame)?);

        Ok(self.submit_readings(timestamp, context, readings).await)
    }

    /// Replace the value of an existing Observation
    #[instrument(skip(self))]
    pub async fn patch_value(&self, resource_id: &str, value: Number) -> AppResult<Value> {
        validate_resource_id(resource_id)?;
        let patch = fhir::build_patch(VALUE_QUANTITY_PATH, value);

        let resource = self.repository.patch_observation(resource_id, &patch).await?;
        info!(resource_id, "Observation patched");
        Ok(resource)
    }

    /// Replace an existing Observation's value with one capability from an envelope
    #[instrument(skip(self, envelope))]
    pub async fn patch_from_envelope(
        &self,
        resource_id: &str,
        capability: &str,
        envelope: &Value,
    ) -> AppResult<Value> {
        coding::resolve(capability)?;

        let reading = envelope::extract_telemetry(envelope)?
            .into_iter()
            .find(|r| r.capability == capability)
            .ok_or_else(|| {
                AppError::malformed(format!("{}.{capability}", envelope::TELEMETRY_PATH), "missing")
            })?;
        let value = reading.value.as_number(capability)?;

        self.patch_value(resource_id, value).await
    }

    async fn submit_readings(
        &self,
        timestamp: &str,
        context: &ClinicalContext,
        readings: Vec<TelemetryReading>,
    ) -> SubmissionReport {
        let submissions = readings
            .iter()
            .map(|reading| self.submit_reading(timestamp, reading, context));
        let report = SubmissionReport {
            outcomes: join_all(submissions).await,
        };

        info!(
            created = report.succeeded().count(),
            failed = report.failed().count(),
            "Submission processed"
        );
        report
    }

    async fn submit_reading(
        &self,
        timestamp: &str,
        reading: &TelemetryReading,
        context: &ClinicalContext,
    ) -> CapabilityOutcome {
        let result = match fhir::build_observation(timestamp, reading, context) {
            Ok(observation) => self.repository.create_observation(&observation).await,
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => debug!(capability = %reading.capability, "Observation created"),
            Err(err) => warn!(
                capability = %reading.capability,
                error_type = err.kind(),
                error = %err,
                "Observation not created"
            ),
        }

        CapabilityOutcome::from_result(&reading.capability, result)
    }
}
