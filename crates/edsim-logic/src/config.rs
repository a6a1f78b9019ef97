//! Run configuration and validation.
//!
//! [`SimulationConfig::validate`] collects every problem at once, like a form
//! validator; [`SimulationConfig::check`] is the fail-fast form the engine uses.

use crate::priority::{Priority, PriorityWeights};
use crate::resources::{Capacities, ResourceKind};
use crate::routing::{PolicyKind, RoutingPolicy};
use crate::service_times::ServiceTimeProfile;
use crate::symptoms::SymptomVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("horizon must be a positive number of minutes")]
    ZeroHorizon,
    #[error("arrival rate must be positive and finite, got {0}")]
    InvalidArrivalRate(f64),
    #[error("{0} needs at least one unit")]
    ZeroCapacity(ResourceKind),
    #[error("{name} must lie in [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
    #[error("weight for {priority} must lie in (0, 1], got {weight}")]
    WeightOutOfRange { priority: Priority, weight: f64 },
    #[error("unknown routing policy '{0}'")]
    UnknownPolicy(String),
    #[error("patients can be routed to {0} but it has no capacity")]
    UnstaffedService(ResourceKind),
    #[error("external patient source has no records")]
    EmptyRecordStream,
    #[error("invalid service-time profile for {0}")]
    InvalidServiceTime(ResourceKind),
    #[error("cannot parse configuration: {0}")]
    Parse(String),
}

/// How MRI need is drawn when a record does not carry the flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MriNeed {
    /// Probability among IMMEDIATE patients; never for the others.
    GivenImmediate(f64),
    /// Same probability for every patient.
    Independent(f64),
}

impl MriNeed {
    pub fn probability(&self) -> f64 {
        match *self {
            MriNeed::GivenImmediate(p) | MriNeed::Independent(p) => p,
        }
    }

    /// Probability of needing MRI at this triage level.
    pub fn probability_for(&self, priority: Priority) -> f64 {
        match *self {
            MriNeed::GivenImmediate(p) if priority == Priority::Immediate => p,
            MriNeed::GivenImmediate(_) => 0.0,
            MriNeed::Independent(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedModel {
    pub mri: MriNeed,
    pub p_ultrasound: f64,
}

impl Default for NeedModel {
    fn default() -> Self {
        Self {
            mri: MriNeed::GivenImmediate(0.5),
            p_ultrasound: 0.2,
        }
    }
}

/// One patient-attribute record supplied by a collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientRecord {
    pub symptoms: SymptomVector,
    /// Pre-assigned triage label. Skips the triage nurse and classifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_mri: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_ultrasound: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatientSourceConfig {
    Synthetic {
        #[serde(default)]
        needs: NeedModel,
    },
    External {
        records: Vec<PatientRecord>,
        #[serde(default)]
        needs: NeedModel,
    },
}

impl Default for PatientSourceConfig {
    fn default() -> Self {
        PatientSourceConfig::Synthetic {
            needs: NeedModel::default(),
        }
    }
}

impl PatientSourceConfig {
    pub fn needs(&self) -> &NeedModel {
        match self {
            PatientSourceConfig::Synthetic { needs } => needs,
            PatientSourceConfig::External { needs, .. } => needs,
        }
    }

    /// Whether a need draw could send a patient from this source to `kind`.
    ///
    /// External records that set the flag themselves are not counted: the
    /// source drops those that need an unstaffed service, one by one.
    pub fn may_route_to(&self, kind: ResourceKind) -> bool {
        let needs = self.needs();
        let (model_p, flag): (f64, fn(&PatientRecord) -> Option<bool>) = match kind {
            ResourceKind::Mri => (needs.mri.probability(), |r: &PatientRecord| r.needs_mri),
            ResourceKind::Ultrasound => (needs.p_ultrasound, |r: &PatientRecord| r.needs_ultrasound),
            ResourceKind::BloodNurse => return false,
            _ => return true,
        };
        match self {
            PatientSourceConfig::Synthetic { .. } => model_p > 0.0,
            PatientSourceConfig::External { records, .. } => {
                model_p > 0.0 && records.iter().any(|r| flag(r).is_none())
            }
        }
    }
}

/// What happens to in-flight work at the horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Nothing at or after the horizon is processed.
    #[default]
    Truncate,
    /// Services already running when the horizon passes may finish.
    FinishCurrentTask,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub horizon_minutes: u32,
    pub arrival_rate_per_hour: f64,
    pub capacities: Capacities,
    pub policy: PolicyKind,
    pub p_single: f64,
    pub p_multi: f64,
    pub priority_weights: PriorityWeights,
    pub seed: u64,
    pub patient_source: PatientSourceConfig,
    pub termination: Termination,
    /// Keep the full event trace in the run result.
    pub record_trace: bool,
    pub service_times: ServiceTimeProfile,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon_minutes: 1440,
            arrival_rate_per_hour: 25.0,
            capacities: Capacities::default(),
            policy: PolicyKind::RuleBased,
            p_single: 0.8,
            p_multi: 0.7,
            priority_weights: PriorityWeights::default(),
            seed: 42,
            patient_source: PatientSourceConfig::default(),
            termination: Termination::Truncate,
            record_trace: false,
            service_times: ServiceTimeProfile::default(),
        }
    }
}

fn check_probability(name: &'static str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::ProbabilityOutOfRange { name, value });
    }
}

impl SimulationConfig {
    /// Parse JSON. Policy labels are checked before the rest of the document
    /// so an unknown label reports as `UnknownPolicy`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(label) = value.get("policy").and_then(|p| p.as_str()) {
            label
                .parse::<PolicyKind>()
                .map_err(|e| ConfigError::UnknownPolicy(e.0))?;
        }
        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy::from_kind(self.policy, self.p_single, self.p_multi)
    }

    pub fn horizon(&self) -> f64 {
        f64::from(self.horizon_minutes)
    }

    /// Everything except the patient source.
    pub fn validate_settings(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.horizon_minutes == 0 {
            errors.push(ConfigError::ZeroHorizon);
        }
        if !(self.arrival_rate_per_hour.is_finite() && self.arrival_rate_per_hour > 0.0) {
            errors.push(ConfigError::InvalidArrivalRate(self.arrival_rate_per_hour));
        }
        for kind in ResourceKind::ALL {
            if kind.required() && self.capacities.get(kind) == 0 {
                errors.push(ConfigError::ZeroCapacity(kind));
            }
        }
        check_probability("p_single", self.p_single, &mut errors);
        check_probability("p_multi", self.p_multi, &mut errors);
        for (priority, weight) in self.priority_weights.out_of_range() {
            errors.push(ConfigError::WeightOutOfRange { priority, weight });
        }
        for kind in self.service_times.invalid_kinds() {
            errors.push(ConfigError::InvalidServiceTime(kind));
        }

        errors
    }

    /// Problems with the configured patient source.
    pub fn validate_source(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let needs = self.patient_source.needs();
        check_probability("p_mri", needs.mri.probability(), &mut errors);
        check_probability("p_ultrasound", needs.p_ultrasound, &mut errors);

        if let PatientSourceConfig::External { records, .. } = &self.patient_source {
            if records.is_empty() {
                errors.push(ConfigError::EmptyRecordStream);
            }
        }
        for kind in [ResourceKind::Mri, ResourceKind::Ultrasound] {
            if self.capacities.get(kind) == 0 && self.patient_source.may_route_to(kind) {
                errors.push(ConfigError::UnstaffedService(kind));
            }
        }
        errors
    }

    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.validate_settings();
        errors.extend(self.validate_source());
        errors
    }

    /// First validation error, if any.
    pub fn check(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_empty());
        assert!(SimulationConfig::default().check().is_ok());
    }

    #[test]
    fn zero_horizon_and_rate() {
        let config = SimulationConfig {
            horizon_minutes: 0,
            arrival_rate_per_hour: -1.0,
            ..Default::default()
        };
        let errors = config.validate();
        assert!(errors.contains(&ConfigError::ZeroHorizon));
        assert!(errors.contains(&ConfigError::InvalidArrivalRate(-1.0)));
    }

    #[test]
    fn nan_rate_rejected() {
        let config = SimulationConfig {
            arrival_rate_per_hour: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.check(),
            Err(ConfigError::InvalidArrivalRate(_))
        ));
    }

    #[test]
    fn required_pools_need_capacity() {
        let mut config = SimulationConfig::default();
        config.capacities.doctor = 0;
        config.capacities.bed = 0;
        config.capacities.blood_nurse = 0;
        let errors = config.validate();
        assert!(errors.contains(&ConfigError::ZeroCapacity(ResourceKind::Doctor)));
        assert!(errors.contains(&ConfigError::ZeroCapacity(ResourceKind::Bed)));
        assert!(!errors.contains(&ConfigError::ZeroCapacity(ResourceKind::BloodNurse)));
    }

    #[test]
    fn unstaffed_imaging_detected() {
        let mut config = SimulationConfig::default();
        config.capacities.ultrasound = 0;
        assert_eq!(
            config.check(),
            Err(ConfigError::UnstaffedService(ResourceKind::Ultrasound))
        );

        config.patient_source = PatientSourceConfig::Synthetic {
            needs: NeedModel {
                mri: MriNeed::GivenImmediate(0.5),
                p_ultrasound: 0.0,
            },
        };
        assert!(config.check().is_ok());
    }

    #[test]
    fn external_records_with_explicit_flags() {
        let mut config = SimulationConfig::default();
        config.capacities.mri = 0;
        config.patient_source = PatientSourceConfig::External {
            records: vec![PatientRecord {
                needs_mri: Some(false),
                needs_ultrasound: Some(false),
                ..Default::default()
            }],
            needs: NeedModel::default(),
        };
        assert!(config.validate().is_empty());

        // Flagged records are screened by the source, unflagged ones are drawn.
        let flagged = PatientRecord {
            needs_mri: Some(true),
            ..Default::default()
        };
        config.patient_source = PatientSourceConfig::External {
            records: vec![flagged.clone()],
            needs: NeedModel::default(),
        };
        assert!(config.validate().is_empty());
        config.patient_source = PatientSourceConfig::External {
            records: vec![flagged, PatientRecord::default()],
            needs: NeedModel::default(),
        };
        assert_eq!(
            config.check(),
            Err(ConfigError::UnstaffedService(ResourceKind::Mri))
        );

        config.patient_source = PatientSourceConfig::External {
            records: vec![],
            needs: NeedModel::default(),
        };
        assert!(config.validate().contains(&ConfigError::EmptyRecordStream));
    }

    #[test]
    fn probabilities_and_weights_checked() {
        let mut config = SimulationConfig {
            p_single: 1.5,
            p_multi: -0.1,
            ..Default::default()
        };
        config.priority_weights.very_urgent = 0.0;
        let errors = config.validate();
        assert!(errors.contains(&ConfigError::ProbabilityOutOfRange {
            name: "p_single",
            value: 1.5
        }));
        assert!(errors.contains(&ConfigError::ProbabilityOutOfRange {
            name: "p_multi",
            value: -0.1
        }));
        assert!(errors.contains(&ConfigError::WeightOutOfRange {
            priority: Priority::VeryUrgent,
            weight: 0.0
        }));
    }

    #[test]
    fn json_round_trip_and_unknown_policy() {
        let json = r#"{
            "horizon_minutes": 5000,
            "arrival_rate_per_hour": 25.0,
            "policy": "single_agent",
            "p_single": 0.8,
            "patient_source": {"kind": "synthetic", "needs": {"mri": {"independent": 0.1}}}
        }"#;
        let config = SimulationConfig::from_json(json).unwrap();
        assert_eq!(config.horizon_minutes, 5000);
        assert_eq!(config.policy, PolicyKind::SingleAgent);
        assert_eq!(config.patient_source.needs().mri, MriNeed::Independent(0.1));
        assert_eq!(config.patient_source.needs().p_ultrasound, 0.2);
        assert_eq!(config.capacities, Capacities::default());

        let err = SimulationConfig::from_json(r#"{"policy": "coin_flip"}"#).unwrap_err();
        assert_eq!(err, ConfigError::UnknownPolicy("coin_flip".into()));

        assert!(matches!(
            SimulationConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn mri_need_by_priority() {
        let given = MriNeed::GivenImmediate(0.5);
        assert_eq!(given.probability_for(Priority::Immediate), 0.5);
        assert_eq!(given.probability_for(Priority::Urgent), 0.0);
        assert_eq!(MriNeed::Independent(0.3).probability_for(Priority::Standard), 0.3);
    }
}
