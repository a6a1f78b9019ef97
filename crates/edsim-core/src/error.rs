//! Engine error types.

use edsim_logic::config::ConfigError;
use edsim_logic::fuzzy::FuzzyError;
use edsim_logic::resources::{PatientId, ResourceKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error(transparent)]
    Fuzzy(#[from] FuzzyError),

    /// A sampling distribution rejected its parameters.
    #[error("distribution: {0}")]
    Distribution(String),

    /// A queue or timestamp invariant broke mid-run. Always a bug.
    #[error("invariant violated at t={clock:.3} ({}, {}): {detail}", fmt_patient(.patient), fmt_resource(.resource))]
    InvariantViolation {
        clock: f64,
        patient: Option<PatientId>,
        resource: Option<ResourceKind>,
        detail: String,
    },

    #[error("event trace: {0}")]
    Trace(#[from] TraceError),
}

fn fmt_patient(patient: &Option<PatientId>) -> String {
    patient.map_or_else(|| "no patient".to_string(), |p| p.to_string())
}

fn fmt_resource(resource: &Option<ResourceKind>) -> String {
    resource.map_or_else(|| "no resource".to_string(), |r| r.to_string())
}

impl SimError {
    pub fn invariant(
        clock: f64,
        patient: Option<PatientId>,
        resource: Option<ResourceKind>,
        detail: impl Into<String>,
    ) -> Self {
        SimError::InvariantViolation {
            clock,
            patient,
            resource,
            detail: detail.into(),
        }
    }
}

/// Errors reading or writing an encoded event trace.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
    #[error("trace version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_message_names_patient_and_resource() {
        let err = SimError::invariant(
            12.5,
            Some(PatientId(7)),
            Some(ResourceKind::Doctor),
            "in service exceeds capacity",
        );
        let msg = err.to_string();
        assert!(msg.contains("t=12.500"));
        assert!(msg.contains("patient#7"));
        assert!(msg.contains("DOCTOR"));
        assert!(msg.contains("in service exceeds capacity"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: SimError = ConfigError::ZeroHorizon.into();
        assert!(matches!(err, SimError::InvalidConfiguration(ConfigError::ZeroHorizon)));
    }
}
