//! Centralized error handling module
//!
//! Provides unified error types and HTTP response mapping for the entire application.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Application-wide error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Envelope is structurally invalid at `field`
    #[error("Malformed envelope at '{field}': {reason}")]
    MalformedEnvelope { field: String, reason: String },

    /// Capability name has no entry in the coding table
    #[error("Unrecognized capability: {0}")]
    UnrecognizedCapability(String),

    /// Patient or encounter identifier is absent
    #[error("Missing clinical context: {0}")]
    MissingContext(String),

    /// Binary uplink buffer is too small for the channel layout
    #[error("Short frame on port {port}: expected at least {expected} bytes, got {actual}")]
    ShortFrame {
        port: u8,
        expected: usize,
        actual: usize,
    },

    /// FHIR store call failed; status is absent when no response arrived
    #[error("Gateway failure{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    GatewayFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::MalformedEnvelope {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable label, shared by HTTP error bodies and batch outcomes
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MalformedEnvelope { .. } => "MALFORMED_ENVELOPE",
            AppError::UnrecognizedCapability(_) => "UNRECOGNIZED_CAPABILITY",
            AppError::MissingContext(_) => "MISSING_CONTEXT",
            AppError::ShortFrame { .. } => "SHORT_FRAME",
            AppError::GatewayFailure { .. } => "GATEWAY_FAILURE",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

/// Standardized error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Unique correlation ID for tracing
    pub correlation_id: String,
    /// Error type classification
    pub error_type: String,
    /// Human-readable error message (safe for clients)
    pub message: String,
    /// HTTP status code
    pub status_code: u16,
    /// Timestamp of the error
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str, status_code: StatusCode) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            status_code: status_code.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            AppError::InternalError(msg) => {
                // Log internal errors but return safe message to client
                error!(error = %msg, "Internal server error occurred");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let error_response = ErrorResponse::new(self.kind(), &message, status);

        error!(
            correlation_id = %error_response.correlation_id,
            error_type = %self.kind(),
            status_code = %status.as_u16(),
            "Error response generated"
        );

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedEnvelope { .. } => StatusCode::BAD_REQUEST,
            AppError::UnrecognizedCapability(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::MissingContext(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ShortFrame { .. } => StatusCode::BAD_REQUEST,
            AppError::GatewayFailure { .. } => StatusCode::BAD_GATEWAY,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_envelope_status() {
        let error = AppError::malformed("device.telemetry", "expected an object");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.kind(), "MALFORMED_ENVELOPE");
        assert!(error.to_string().contains("device.telemetry"));
    }

    #[test]
    fn test_unrecognized_capability_status() {
        let error = AppError::UnrecognizedCapability("foo".to_string());
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.to_string(), "Unrecognized capability: foo");
    }

    #[test]
    fn test_gateway_failure_message() {
        let with_status = AppError::GatewayFailure {
            status: Some(404),
            message: "not found".to_string(),
        };
        assert_eq!(with_status.to_string(), "Gateway failure (HTTP 404): not found");
        assert_eq!(with_status.status_code(), StatusCode::BAD_GATEWAY);

        let without_status = AppError::GatewayFailure {
            status: None,
            message: "timed out".to_string(),
        };
        assert_eq!(without_status.to_string(), "Gateway failure: timed out");
    }

    #[test]
    fn test_short_frame_message() {
        let error = AppError::ShortFrame {
            port: 1,
            expected: 4,
            actual: 2,
        };
        assert_eq!(error.kind(), "SHORT_FRAME");
        assert!(error.to_string().contains("expected at least 4 bytes, got 2"));
    }

    #[test]
    fn test_error_response_format() {
        let response = ErrorResponse::new("TEST_ERROR", "Test message", StatusCode::BAD_REQUEST);
        assert!(!response.correlation_id.is_empty());
        assert_eq!(response.error_type, "TEST_ERROR");
        assert_eq!(response.message, "Test message");
        assert_eq!(response.status_code, 400);
    }
}
