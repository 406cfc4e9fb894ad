//! Application state management
//!
//! Shared by every HTTP worker. Holds the ingestion service and nothing
//! mutable; the FHIR store client lives behind the service's repository.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::coding;
use crate::gateway::ObservationRepository;
use crate::pipeline::IngestService;

/// Central application state
pub struct AppState {
    /// Observation pipeline bound to the configured FHIR store
    pub ingest: IngestService,
    /// Application start time
    start_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state around a repository
    pub fn new(repository: Arc<dyn ObservationRepository>) -> Self {
        info!(
            capabilities = ?coding::known_capabilities(),
            "Initializing application state"
        );
        Self {
            ingest: IngestService::new(repository),
            start_time: Utc::now(),
        }
    }

    /// Get application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }
}
