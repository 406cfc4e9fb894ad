//! Capability coding table
//!
//! Maps device capability names to the clinical vocabulary entry used when
//! they are recorded as Observations. Adding a capability means adding one
//! row to [`CODING_TABLE`]; nothing else branches on capability names.
//!
//! LOINC Code Mappings:
//! - Heart rate (`hr`): 8867-4
//! - Oxygen saturation (`spo2`): 2708-6

use serde::Serialize;

use crate::error::{AppError, AppResult};

/// FHIR coding system URLs
pub mod systems {
    pub const LOINC: &str = "http://loinc.org";
}

/// Vocabulary entry for one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodingDescriptor {
    pub system: &'static str,
    pub code: &'static str,
    pub display: &'static str,
    pub unit: &'static str,
}

/// Capability name to coding descriptor
pub static CODING_TABLE: &[(&str, CodingDescriptor)] = &[
    (
        "hr",
        CodingDescriptor {
            system: systems::LOINC,
            code: "8867-4",
            display: "Heart rate",
            unit: "bpm",
        },
    ),
    (
        "spo2",
        CodingDescriptor {
            system: systems::LOINC,
            code: "2708-6",
            display: "Oxygen Saturation",
            unit: "%",
        },
    ),
];

/// Look up the coding descriptor for a capability (exact, case-sensitive)
pub fn resolve(capability: &str) -> AppResult<&'static CodingDescriptor> {
    CODING_TABLE
        .iter()
        .find(|(name, _)| *name == capability)
        .map(|(_, descriptor)| descriptor)
        .ok_or_else(|| AppError::UnrecognizedCapability(capability.to_string()))
}

/// Capability names with a coding entry, in table order
pub fn known_capabilities() -> Vec<&'static str> {
    CODING_TABLE.iter().map(|(name, _)| *name).collect()
}
