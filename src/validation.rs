//! Input validation module
//!
//! Validates HTTP inputs before they reach the observation pipeline.

use tracing::{debug, warn};
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, AppResult};

/// Longest logical id FHIR allows
pub const MAX_RESOURCE_ID_LEN: usize = 64;

/// Run derive-based validation on a request DTO
pub fn validate_request<T: Validate>(input: &T) -> AppResult<()> {
    if let Err(validation_errors) = input.validate() {
        let message = describe(&validation_errors);
        warn!(errors = %message, "Request validation failed");
        return Err(AppError::ValidationError(message));
    }

    debug!("Request validation passed");
    Ok(())
}

/// Check a FHIR logical id (`[A-Za-z0-9\-\.]{1,64}`) before it is placed in a URL
pub fn validate_resource_id(id: &str) -> AppResult<()> {
    if id.is_empty() || id.len() > MAX_RESOURCE_ID_LEN {
        return Err(AppError::ValidationError(format!(
            "Resource id must be 1 to {} characters",
            MAX_RESOURCE_ID_LEN
        )));
    }

    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        return Err(AppError::ValidationError(format!(
            "Resource id contains invalid character '{}'",
            bad
        )));
    }

    Ok(())
}

fn describe(validation_errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = validation_errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let msgs: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|c| c.as_ref()))
                .collect();
            format!("{}: {}", field, msgs.join(", "))
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecodeRequest, UplinkRequest};

    fn uplink_request() -> UplinkRequest {
        UplinkRequest {
            port: 1,
            payload: vec![98, 72, 0x0E, 0x3E],
            timestamp: "2023-01-01T00:00:00Z".to_string(),
            patient_id: "P1".to_string(),
            encounter_id: "E1".to_string(),
        }
    }

    #[test]
    fn test_valid_uplink_request() {
        assert!(validate_request(&uplink_request()).is_ok());
    }

    #[test]
    fn test_oversized_uplink_request_names_payload() {
        let mut input = uplink_request();
        input.payload = vec![0; 243];

        let result = validate_request(&input);

        if let Err(AppError::ValidationError(msg)) = result {
            assert!(msg.contains("Payload exceeds the maximum uplink size"));
        } else {
            panic!("expected a validation error");
        }
    }

    #[test]
    fn test_oversized_decode_request() {
        let input = DecodeRequest {
            port: 1,
            payload: vec![0; 243],
        };

        assert!(validate_request(&input).is_err());
    }

    #[test]
    fn test_resource_id_validation() {
        assert!(validate_resource_id("58bfeb6f-f3bd-424c-a6f9-2815af956ae9").is_ok());
        assert!(validate_resource_id("obs.1").is_ok());

        assert!(validate_resource_id("").is_err());
        assert!(validate_resource_id(&"a".repeat(65)).is_err());
        assert!(validate_resource_id("../Patient/1").is_err());
        assert!(validate_resource_id("obs 1").is_err());
    }
}
