//! Resource kinds, capacities and patient identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable patient identifier, assigned in ascending arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientId(pub u64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patient#{}", self.0)
    }
}

/// The closed set of ED resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    TriageNurse,
    Doctor,
    Mri,
    Ultrasound,
    Bed,
    BloodNurse,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::TriageNurse,
        ResourceKind::Doctor,
        ResourceKind::Mri,
        ResourceKind::Ultrasound,
        ResourceKind::Bed,
        ResourceKind::BloodNurse,
    ];

    /// The four resources reported in headline KPIs.
    pub const MAIN: [ResourceKind; 4] = [
        ResourceKind::Doctor,
        ResourceKind::Mri,
        ResourceKind::Ultrasound,
        ResourceKind::Bed,
    ];

    /// Doctors and imaging can be taken over by a more urgent patient.
    pub fn preemptible(self) -> bool {
        matches!(
            self,
            ResourceKind::Doctor | ResourceKind::Mri | ResourceKind::Ultrasound
        )
    }

    /// Pools that every run needs at least one unit of.
    pub fn required(self) -> bool {
        matches!(
            self,
            ResourceKind::TriageNurse | ResourceKind::Doctor | ResourceKind::Bed
        )
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::TriageNurse => "TRIAGE_NURSE",
            ResourceKind::Doctor => "DOCTOR",
            ResourceKind::Mri => "MRI",
            ResourceKind::Ultrasound => "ULTRASOUND",
            ResourceKind::Bed => "BED",
            ResourceKind::BloodNurse => "BLOOD_NURSE",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parallel units per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    pub triage: u32,
    pub doctor: u32,
    pub mri: u32,
    pub ultrasound: u32,
    pub bed: u32,
    pub blood_nurse: u32,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            triage: 1,
            doctor: 3,
            mri: 1,
            ultrasound: 1,
            bed: 5,
            blood_nurse: 1,
        }
    }
}

impl Capacities {
    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::TriageNurse => self.triage,
            ResourceKind::Doctor => self.doctor,
            ResourceKind::Mri => self.mri,
            ResourceKind::Ultrasound => self.ultrasound,
            ResourceKind::Bed => self.bed,
            ResourceKind::BloodNurse => self.blood_nurse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preemptible_kinds() {
        let preemptible: Vec<_> = ResourceKind::ALL
            .iter()
            .filter(|k| k.preemptible())
            .collect();
        assert_eq!(
            preemptible,
            vec![&ResourceKind::Doctor, &ResourceKind::Mri, &ResourceKind::Ultrasound]
        );
        assert!(!ResourceKind::Bed.preemptible());
        assert!(!ResourceKind::TriageNurse.preemptible());
    }

    #[test]
    fn test_index_matches_all() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_capacity_lookup() {
        let caps = Capacities::default();
        assert_eq!(caps.get(ResourceKind::Doctor), 3);
        assert_eq!(caps.get(ResourceKind::Bed), 5);
        assert_eq!(caps.get(ResourceKind::BloodNurse), 1);
    }
}
