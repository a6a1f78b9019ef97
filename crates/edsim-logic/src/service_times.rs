//! Service-time parameters per resource kind.
//!
//! Sampling lives in the engine crate; this module only holds the numbers
//! and the arithmetic that turns them into distribution parameters.

use crate::priority::Priority;
use crate::resources::ResourceKind;
use serde::{Deserialize, Serialize};

/// Log-normal target for one resource, clipped to [min, max] minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub mean: f64,
    /// Coefficient of variation.
    pub cv: f64,
    pub min: f64,
    pub max: f64,
}

impl ServiceSpec {
    pub const fn new(mean: f64, cv: f64, min: f64, max: f64) -> Self {
        Self { mean, cv, min, max }
    }

    /// Underlying normal (mu, sigma) for a log-normal with this mean and cv,
    /// after scaling the mean by `multiplier`.
    pub fn log_normal_params(&self, multiplier: f64) -> (f64, f64) {
        let mean = self.mean * multiplier;
        let sigma2 = (1.0 + self.cv * self.cv).ln();
        (mean.ln() - sigma2 / 2.0, sigma2.sqrt())
    }

    pub fn clip(&self, minutes: f64) -> f64 {
        minutes.clamp(self.min, self.max)
    }

    pub fn is_valid(&self) -> bool {
        self.mean.is_finite()
            && self.mean > 0.0
            && self.cv.is_finite()
            && self.cv > 0.0
            && self.cv <= 0.4
            && self.min.is_finite()
            && self.max.is_finite()
            && 0.0 <= self.min
            && self.min <= self.max
    }
}

/// Service specs for every resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTimeProfile {
    pub triage: ServiceSpec,
    pub doctor: ServiceSpec,
    pub mri: ServiceSpec,
    pub ultrasound: ServiceSpec,
    pub bed: ServiceSpec,
    pub blood_nurse: ServiceSpec,
}

impl Default for ServiceTimeProfile {
    fn default() -> Self {
        Self {
            triage: ServiceSpec::new(7.0, 0.3, 2.0, 20.0),
            doctor: ServiceSpec::new(18.0, 0.4, 5.0, 90.0),
            mri: ServiceSpec::new(35.0, 0.25, 15.0, 90.0),
            ultrasound: ServiceSpec::new(20.0, 0.3, 8.0, 60.0),
            bed: ServiceSpec::new(240.0, 0.4, 60.0, 720.0),
            blood_nurse: ServiceSpec::new(20.0, 0.3, 5.0, 60.0),
        }
    }
}

/// Fraction of the scaled bed mean that bounds a non-urgent stay.
const NON_URGENT_BED_SPREAD: f64 = 0.5;

impl ServiceTimeProfile {
    pub fn spec(&self, kind: ResourceKind) -> &ServiceSpec {
        match kind {
            ResourceKind::TriageNurse => &self.triage,
            ResourceKind::Doctor => &self.doctor,
            ResourceKind::Mri => &self.mri,
            ResourceKind::Ultrasound => &self.ultrasound,
            ResourceKind::Bed => &self.bed,
            ResourceKind::BloodNurse => &self.blood_nurse,
        }
    }

    /// Kinds whose specs fail [`ServiceSpec::is_valid`].
    pub fn invalid_kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|&k| !self.spec(k).is_valid())
            .collect()
    }

    /// Bounds of the uniform non-urgent bed stay: m * (1 -/+ 0.5) with
    /// m = bed mean * non-urgent multiplier, clipped to the bed limits.
    pub fn non_urgent_bed_bounds(&self) -> (f64, f64) {
        let m = self.bed.mean * priority_multiplier(ResourceKind::Bed, Priority::NonUrgent);
        let lo = self.bed.clip(m * (1.0 - NON_URGENT_BED_SPREAD));
        let hi = self.bed.clip(m * (1.0 + NON_URGENT_BED_SPREAD));
        (lo, hi)
    }
}

/// Doctor and bed durations scale with acuity. Other kinds return 1.
pub fn priority_multiplier(kind: ResourceKind, priority: Priority) -> f64 {
    if !matches!(kind, ResourceKind::Doctor | ResourceKind::Bed) {
        return 1.0;
    }
    match priority {
        Priority::Immediate => 1.8,
        Priority::VeryUrgent => 1.5,
        Priority::Urgent => 1.2,
        Priority::Standard => 1.0,
        Priority::NonUrgent => 0.8,
    }
}

/// Whether this (kind, priority) pair uses the bounded uniform draw.
pub fn uses_uniform_stay(kind: ResourceKind, priority: Priority) -> bool {
    kind == ResourceKind::Bed && priority == Priority::NonUrgent
}
