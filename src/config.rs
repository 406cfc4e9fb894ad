//! Configuration management module
//!
//! Loads and validates environment-based configuration.

use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::gateway::FhirStorePath;

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid number format in environment variable {0}")]
    ParseError(&'static str),

    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
}

/// Server configuration settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Cloud Healthcare FHIR store settings
#[derive(Debug, Clone, Deserialize)]
pub struct HealthcareSettings {
    /// API root, e.g. `https://healthcare.googleapis.com/v1`
    pub base_url: String,
    pub project: String,
    pub location: String,
    pub dataset: String,
    pub fhir_store: String,
    /// OAuth bearer token; acquiring it is the deployment's job
    pub access_token: Option<String>,
    pub timeout_ms: u64,
}

impl HealthcareSettings {
    pub fn store_path(&self) -> FhirStorePath {
        FhirStorePath {
            project: self.project.clone(),
            location: self.location.clone(),
            dataset: self.dataset.clone(),
            fhir_store: self.fhir_store.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub healthcare: HealthcareSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|_| SettingsError::ParseError("SERVER_PORT"))?;

        let timeout_ms = env::var("HEALTHCARE_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".into())
            .parse()
            .map_err(|_| SettingsError::ParseError("HEALTHCARE_TIMEOUT_MS"))?;

        Ok(Self {
            server: ServerSettings {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
                port,
            },
            healthcare: HealthcareSettings {
                base_url: env::var("HEALTHCARE_BASE_URL")
                    .unwrap_or_else(|_| "https://healthcare.googleapis.com/v1".into()),
                project: required("HEALTHCARE_PROJECT")?,
                location: required("HEALTHCARE_LOCATION")?,
                dataset: required("HEALTHCARE_DATASET")?,
                fhir_store: required("HEALTHCARE_FHIR_STORE")?,
                access_token: env::var("HEALTHCARE_ACCESS_TOKEN")
                    .ok()
                    .filter(|token| !token.is_empty()),
                timeout_ms,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, SettingsError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(SettingsError::Missing(name))
}
