//! Routing policies and pathway plans.
//!
//! Plans are pure: the single random draw an agent policy needs is supplied
//! by the caller, so the same inputs always give the same pathway.

use crate::priority::Priority;
use crate::resources::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    RuleBased,
    SingleAgent,
    MultiAgent,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [
        PolicyKind::RuleBased,
        PolicyKind::SingleAgent,
        PolicyKind::MultiAgent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PolicyKind::RuleBased => "rule_based",
            PolicyKind::SingleAgent => "single_agent",
            PolicyKind::MultiAgent => "multi_agent",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a policy label is not one of the three known ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicy(pub String);

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown routing policy '{}'", self.0)
    }
}

impl std::error::Error for UnknownPolicy {}

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyKind::ALL
            .into_iter()
            .find(|p| p.label() == s)
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

/// A policy with its bypass probability resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingPolicy {
    RuleBased,
    SingleAgent { p_bypass: f64 },
    MultiAgent { p_bypass: f64 },
}

impl RoutingPolicy {
    pub fn from_kind(kind: PolicyKind, p_single: f64, p_multi: f64) -> Self {
        match kind {
            PolicyKind::RuleBased => RoutingPolicy::RuleBased,
            PolicyKind::SingleAgent => RoutingPolicy::SingleAgent { p_bypass: p_single },
            PolicyKind::MultiAgent => RoutingPolicy::MultiAgent { p_bypass: p_multi },
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            RoutingPolicy::RuleBased => PolicyKind::RuleBased,
            RoutingPolicy::SingleAgent { .. } => PolicyKind::SingleAgent,
            RoutingPolicy::MultiAgent { .. } => PolicyKind::MultiAgent,
        }
    }

    /// Configured bypass set point (0 for the rule-based policy).
    pub fn set_point(&self) -> f64 {
        match *self {
            RoutingPolicy::RuleBased => 0.0,
            RoutingPolicy::SingleAgent { p_bypass } | RoutingPolicy::MultiAgent { p_bypass } => {
                p_bypass
            }
        }
    }

    /// Whether this patient is eligible for the direct-imaging bypass,
    /// i.e. whether planning will consume a random draw.
    pub fn draws_for(&self, priority: Priority, needs: Needs) -> bool {
        !matches!(self, RoutingPolicy::RuleBased)
            && priority == Priority::Immediate
            && needs.mri
    }
}

/// Imaging needs resolved for one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Needs {
    pub mri: bool,
    pub ultrasound: bool,
}

/// `[DOCTOR, MRI?, ULTRASOUND?, BED]`
pub fn rule_based_pathway(needs: Needs) -> Vec<ResourceKind> {
    let mut tasks = vec![ResourceKind::Doctor];
    if needs.mri {
        tasks.push(ResourceKind::Mri);
    }
    if needs.ultrasound {
        tasks.push(ResourceKind::Ultrasound);
    }
    tasks.push(ResourceKind::Bed);
    tasks
}

/// `[MRI, ULTRASOUND?, BED]`
pub fn bypass_pathway(needs: Needs) -> Vec<ResourceKind> {
    let mut tasks = vec![ResourceKind::Mri];
    if needs.ultrasound {
        tasks.push(ResourceKind::Ultrasound);
    }
    tasks.push(ResourceKind::Bed);
    tasks
}

/// Ordered task list for a triaged patient.
///
/// `draw` yields a uniform sample in [0, 1) and is called only when
/// [`RoutingPolicy::draws_for`] is true. The bypass fires when the draw is
/// below the policy's probability.
pub fn plan_pathway(
    policy: &RoutingPolicy,
    priority: Priority,
    needs: Needs,
    draw: impl FnOnce() -> f64,
) -> Vec<ResourceKind> {
    if policy.draws_for(priority, needs) && draw() < policy.set_point() {
        bypass_pathway(needs)
    } else {
        rule_based_pathway(needs)
    }
}

/// Pathway shape buckets used in routing evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathwayClass {
    DoctorOnly,
    DoctorMriBed,
    DoctorUltrasoundBed,
    DoctorBothImagingBed,
    DirectMri,
    DirectUltrasound,
    Other,
}

impl PathwayClass {
    pub fn of(tasks: &[ResourceKind]) -> Self {
        use crate::resources::ResourceKind::*;
        match tasks {
            [Doctor, Bed] | [Doctor] => PathwayClass::DoctorOnly,
            [Doctor, Mri, Bed] => PathwayClass::DoctorMriBed,
            [Doctor, Ultrasound, Bed] => PathwayClass::DoctorUltrasoundBed,
            [Doctor, Mri, Ultrasound, Bed] => PathwayClass::DoctorBothImagingBed,
            [Mri, ..] => PathwayClass::DirectMri,
            [Ultrasound, ..] => PathwayClass::DirectUltrasound,
            _ => PathwayClass::Other,
        }
    }
}
