//! FHIR store gateway
//!
//! The boundary between the observation pipeline and the clinical data store.
//! The pipeline only sees [`ObservationRepository`]; [`HealthcareGateway`]
//! implements it against the Cloud Healthcare FHIR REST API.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::fhir::{FhirObservation, PatchDocument};

pub const FHIR_JSON: &str = "application/fhir+json";
pub const JSON_PATCH: &str = "application/json-patch+json";

/// Create and patch operations against the clinical data store
///
/// Implementations must not retry internally; failures are reported as
/// `AppError::GatewayFailure` and handed back verbatim.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Create a new Observation, returning the stored resource
    async fn create_observation(&self, observation: &FhirObservation) -> AppResult<Value>;

    /// Apply a JSON Patch to an existing Observation, returning the updated resource
    async fn patch_observation(&self, resource_id: &str, patch: &PatchDocument)
        -> AppResult<Value>;
}

/// Fully qualified FHIR store name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FhirStorePath {
    pub project: String,
    pub location: String,
    pub dataset: String,
    pub fhir_store: String,
}

impl FhirStorePath {
    pub fn observation_collection(&self) -> String {
        format!("{self}/fhir/Observation")
    }

    pub fn observation(&self, resource_id: &str) -> String {
        format!("{self}/fhir/Observation/{resource_id}")
    }
}

impl fmt::Display for FhirStorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/datasets/{}/fhirStores/{}",
            self.project, self.location, self.dataset, self.fhir_store
        )
    }
}

/// HTTP client for a Cloud Healthcare FHIR store
#[derive(Debug, Clone)]
pub struct HealthcareGateway {
    client: Client,
    base_url: String,
    store: FhirStorePath,
    access_token: Option<String>,
}

impl HealthcareGateway {
    pub fn new(
        base_url: &str,
        store: FhirStorePath,
        access_token: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Value> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "FHIR store request failed");
            AppError::GatewayFailure {
                status: None,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::GatewayFailure {
            status: Some(status.as_u16()),
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "FHIR store rejected request");
            return Err(AppError::GatewayFailure {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| AppError::GatewayFailure {
            status: Some(status.as_u16()),
            message: format!("invalid JSON in response: {e}"),
        })
    }
}

#[async_trait]
impl ObservationRepository for HealthcareGateway {
    async fn create_observation(&self, observation: &FhirObservation) -> AppResult<Value> {
        let url = self.url(&self.store.observation_collection());
        let body = serde_json::to_vec(observation)
            .map_err(|e| AppError::InternalError(format!("failed to encode observation: {e}")))?;

        debug!(url = %url, "Creating observation");
        self.send(
            self.client
                .post(url)
                .header(CONTENT_TYPE, FHIR_JSON)
                .body(body),
        )
        .await
    }

    async fn patch_observation(
        &self,
        resource_id: &str,
        patch: &PatchDocument,
    ) -> AppResult<Value> {
        let url = self.url(&self.store.observation(resource_id));
        let body = serde_json::to_vec(patch)
            .map_err(|e| AppError::InternalError(format!("failed to encode patch: {e}")))?;

        debug!(url = %url, "Patching observation");
        self.send(
            self.client
                .patch(url)
                .header(CONTENT_TYPE, JSON_PATCH)
                .body(body),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::{build_patch, VALUE_QUANTITY_PATH};
    use serde_json::Number;

    fn store() -> FhirStorePath {
        FhirStorePath {
            project: "iothealthcare".to_string(),
            location: "europe-west4".to_string(),
            dataset: "IoTHealthcareDataset".to_string(),
            fhir_store: "ObservationsDataStore".to_string(),
        }
    }

    #[test]
    fn test_store_paths() {
        let store = store();

        assert_eq!(
            store.to_string(),
            "projects/iothealthcare/locations/europe-west4/datasets/IoTHealthcareDataset/fhirStores/ObservationsDataStore"
        );
        assert!(store.observation_collection().ends_with("/fhirStores/ObservationsDataStore/fhir/Observation"));
        assert!(store
            .observation("58bfeb6f-f3bd-424c-a6f9-2815af956ae9")
            .ends_with("/fhir/Observation/58bfeb6f-f3bd-424c-a6f9-2815af956ae9"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let gateway = HealthcareGateway::new(
            "https://healthcare.googleapis.com/v1/",
            store(),
            None,
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            gateway.url("projects/p"),
            "https://healthcare.googleapis.com/v1/projects/p"
        );
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_gateway_failure() {
        let gateway = HealthcareGateway::new(
            "http://127.0.0.1:1",
            store(),
            Some("token".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();

        let patch = build_patch(VALUE_QUANTITY_PATH, Number::from(75));
        let err = gateway.patch_observation("obs-1", &patch).await.unwrap_err();

        assert!(matches!(err, AppError::GatewayFailure { status: None, .. }));
    }
}
