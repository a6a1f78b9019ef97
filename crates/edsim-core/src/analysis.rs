//! Post-run analysis - headline KPIs and findings derived from a summary.
//!
//! Everything here is a pure function of [`RunSummary`]; nothing touches
//! the engine. KPIs average over the four main resources (doctor, MRI,
//! ultrasound, bed), skipping unstaffed pools.

use std::fmt;

use edsim_logic::resources::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::metrics::{ResourceSummary, RunSummary};

/// Mean wait above this multiple of mean service time is flagged.
pub const HIGH_WAIT_RATIO: f64 = 1.5;
/// Mean wait below this multiple of mean service time is noted as good.
pub const LOW_WAIT_RATIO: f64 = 0.8;
/// Queue peak above this length is flagged.
pub const QUEUE_PEAK_LIMIT: u32 = 5;
pub const HIGH_UTILIZATION: f64 = 0.9;
pub const LOW_UTILIZATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub mean_wait: f64,
    /// In [0, 1].
    pub mean_utilization: f64,
    pub mean_queue: f64,
    /// Main resource with the highest mean wait.
    pub bottleneck: Option<ResourceKind>,
    /// 0 to 100.
    pub efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BypassGrade {
    Excellent,
    Good,
    Suboptimal,
    Poor,
}

impl BypassGrade {
    /// Grade an urgent bypass rate given as a fraction.
    pub fn of(rate: f64) -> Self {
        let percent = rate * 100.0;
        if percent > 80.0 {
            BypassGrade::Excellent
        } else if percent > 50.0 {
            BypassGrade::Good
        } else if percent > 20.0 {
            BypassGrade::Suboptimal
        } else {
            BypassGrade::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BypassGrade::Excellent => "excellent",
            BypassGrade::Good => "good",
            BypassGrade::Suboptimal => "suboptimal",
            BypassGrade::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Finding {
    HighWait {
        kind: ResourceKind,
        mean_wait: f64,
        mean_service: f64,
    },
    LowWait {
        kind: ResourceKind,
        mean_wait: f64,
        mean_service: f64,
    },
    QueuePeak {
        kind: ResourceKind,
        peak: u32,
    },
    HighUtilization {
        kind: ResourceKind,
        utilization: f64,
    },
    LowUtilization {
        kind: ResourceKind,
        utilization: f64,
    },
    UrgentBypass {
        rate: f64,
        grade: BypassGrade,
    },
}

impl Finding {
    /// Findings that call for action rather than note good behaviour.
    pub fn is_concern(&self) -> bool {
        match self {
            Finding::HighWait { .. }
            | Finding::QueuePeak { .. }
            | Finding::HighUtilization { .. }
            | Finding::LowUtilization { .. } => true,
            Finding::LowWait { .. } => false,
            Finding::UrgentBypass { grade, .. } => *grade >= BypassGrade::Suboptimal,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::HighWait {
                kind,
                mean_wait,
                mean_service,
            } => write!(
                f,
                "{kind}: mean wait {mean_wait:.1} min exceeds {HIGH_WAIT_RATIO}x mean service {mean_service:.1} min"
            ),
            Finding::LowWait {
                kind,
                mean_wait,
                mean_service,
            } => write!(
                f,
                "{kind}: mean wait {mean_wait:.1} min is under {LOW_WAIT_RATIO}x mean service {mean_service:.1} min"
            ),
            Finding::QueuePeak { kind, peak } => {
                write!(f, "{kind}: queue peaked at {peak} patients")
            }
            Finding::HighUtilization { kind, utilization } => {
                write!(f, "{kind}: utilization {:.1}% is near saturation", utilization * 100.0)
            }
            Finding::LowUtilization { kind, utilization } => {
                write!(f, "{kind}: utilization {:.1}% leaves capacity idle", utilization * 100.0)
            }
            Finding::UrgentBypass { rate, grade } => write!(
                f,
                "urgent MRI bypass rate {:.1}% is {}",
                rate * 100.0,
                grade.label()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAnalysis {
    pub kpis: Kpis,
    pub findings: Vec<Finding>,
}

impl RunAnalysis {
    pub fn concerns(&self) -> impl Iterator<Item = &Finding> + '_ {
        self.findings.iter().filter(|f| f.is_concern())
    }
}

/// Mean busy minutes per service, or `None` before the first one. A service
/// split by evictions counts once.
fn mean_service(resource: &ResourceSummary) -> Option<f64> {
    let services = resource.services();
    (services > 0).then(|| resource.busy_time / services as f64)
}

fn staffed_main(summary: &RunSummary) -> impl Iterator<Item = &ResourceSummary> + '_ {
    ResourceKind::MAIN
        .iter()
        .filter_map(|&kind| summary.resource(kind))
        .filter(|r| r.capacity > 0)
}

pub fn kpis(summary: &RunSummary) -> Kpis {
    let main: Vec<&ResourceSummary> = staffed_main(summary).collect();
    if main.is_empty() {
        return Kpis {
            mean_wait: 0.0,
            mean_utilization: 0.0,
            mean_queue: 0.0,
            bottleneck: None,
            efficiency: 0.0,
        };
    }
    let n = main.len() as f64;
    let mean_wait = main.iter().map(|r| r.waits.mean).sum::<f64>() / n;
    let mean_utilization = main.iter().map(|r| r.utilization).sum::<f64>() / n;
    let mean_queue = main.iter().map(|r| r.queue_mean).sum::<f64>() / n;
    let bottleneck = main
        .iter()
        .filter(|r| r.waits.count > 0)
        .max_by(|a, b| a.waits.mean.total_cmp(&b.waits.mean))
        .map(|r| r.kind);
    let efficiency =
        ((mean_utilization * 100.0).min(100.0) + (100.0 - mean_wait).max(0.0)) / 2.0;

    Kpis {
        mean_wait,
        mean_utilization,
        mean_queue,
        bottleneck,
        efficiency,
    }
}

pub fn findings(summary: &RunSummary) -> Vec<Finding> {
    let mut findings = Vec::new();
    for resource in staffed_main(summary) {
        let kind = resource.kind;
        if let Some(service) = mean_service(resource) {
            let wait = resource.waits.mean;
            if wait > HIGH_WAIT_RATIO * service {
                findings.push(Finding::HighWait {
                    kind,
                    mean_wait: wait,
                    mean_service: service,
                });
            } else if wait < LOW_WAIT_RATIO * service {
                findings.push(Finding::LowWait {
                    kind,
                    mean_wait: wait,
                    mean_service: service,
                });
            }
        }
        if resource.queue_max > QUEUE_PEAK_LIMIT {
            findings.push(Finding::QueuePeak {
                kind,
                peak: resource.queue_max,
            });
        }
        if resource.utilization > HIGH_UTILIZATION {
            findings.push(Finding::HighUtilization {
                kind,
                utilization: resource.utilization,
            });
        } else if resource.utilization < LOW_UTILIZATION {
            findings.push(Finding::LowUtilization {
                kind,
                utilization: resource.utilization,
            });
        }
    }
    if summary.urgent_care.immediate_mri_patients > 0 {
        let rate = summary.urgent_care.bypass_rate;
        findings.push(Finding::UrgentBypass {
            rate,
            grade: BypassGrade::of(rate),
        });
    }
    findings
}

pub fn analyze(summary: &RunSummary) -> RunAnalysis {
    RunAnalysis {
        kpis: kpis(summary),
        findings: findings(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RoutingAgent;
    use crate::metrics::{MetricsCollector, RunContext};
    use edsim_logic::resources::Capacities;
    use edsim_logic::routing::{PolicyKind, RoutingPolicy};

    fn summary_with(setup: impl FnOnce(&mut MetricsCollector)) -> RunSummary {
        let mut metrics = MetricsCollector::new();
        setup(&mut metrics);
        let routing = RoutingAgent::new(RoutingPolicy::RuleBased).evaluate(&[]);
        metrics.summarize(
            RunContext {
                policy: PolicyKind::RuleBased,
                seed: 1,
                horizon: 100.0,
                ended_at: 100.0,
                capacities: Capacities {
                    triage: 1,
                    doctor: 1,
                    mri: 1,
                    ultrasound: 0,
                    bed: 1,
                    blood_nurse: 1,
                },
            },
            &[],
            routing,
        )
    }

    #[test]
    fn test_bypass_grades() {
        assert_eq!(BypassGrade::of(0.81), BypassGrade::Excellent);
        assert_eq!(BypassGrade::of(0.8), BypassGrade::Good);
        assert_eq!(BypassGrade::of(0.3), BypassGrade::Suboptimal);
        assert_eq!(BypassGrade::of(0.2), BypassGrade::Poor);
        assert_eq!(BypassGrade::of(0.0), BypassGrade::Poor);
    }

    #[test]
    fn test_kpis_skip_unstaffed_pools() {
        let summary = summary_with(|m| {
            m.record_grant(ResourceKind::Doctor, 30.0, false);
            m.record_service(ResourceKind::Doctor, 95.0);
            m.record_grant(ResourceKind::Mri, 0.0, false);
            m.record_service(ResourceKind::Mri, 5.0);
        });
        let kpis = kpis(&summary);
        // Doctor, MRI and bed; ultrasound has no capacity.
        assert!((kpis.mean_wait - 10.0).abs() < 1e-12);
        assert!((kpis.mean_utilization - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(kpis.bottleneck, Some(ResourceKind::Doctor));
        let expected = (100.0 / 3.0 + 90.0) / 2.0;
        assert!((kpis.efficiency - expected).abs() < 1e-9);
    }

    #[test]
    fn test_resumed_service_counts_once() {
        // One doctor visit of 60 min split by an eviction.
        let summary = summary_with(|m| {
            m.record_grant(ResourceKind::Doctor, 0.0, false);
            m.record_service(ResourceKind::Doctor, 20.0);
            m.record_grant(ResourceKind::Doctor, 100.0, true);
            m.record_service(ResourceKind::Doctor, 40.0);
        });
        let doctor = summary.resource(ResourceKind::Doctor).unwrap();
        assert_eq!((doctor.grants, doctor.resumed, doctor.services()), (2, 1, 1));
        assert_eq!(mean_service(doctor), Some(60.0));
        // Mean wait 50 against 60 min of service: neither too long nor too short.
        assert!(!findings(&summary).iter().any(|f| matches!(
            f,
            Finding::HighWait {
                kind: ResourceKind::Doctor,
                ..
            } | Finding::LowWait {
                kind: ResourceKind::Doctor,
                ..
            }
        )));
    }

    #[test]
    fn test_findings_flag_waits_and_utilization() {
        let summary = summary_with(|m| {
            m.record_grant(ResourceKind::Doctor, 100.0, false);
            m.record_service(ResourceKind::Doctor, 95.0);
            m.record_grant(ResourceKind::Mri, 1.0, false);
            m.record_service(ResourceKind::Mri, 10.0);
            m.record_release(ResourceKind::Bed, 50.0, 7);
        });
        let found = findings(&summary);
        assert!(found.contains(&Finding::HighUtilization {
            kind: ResourceKind::Doctor,
            utilization: 0.95
        }));
        assert!(found.iter().any(|f| matches!(
            f,
            Finding::LowWait {
                kind: ResourceKind::Mri,
                ..
            }
        )));
        assert!(found.contains(&Finding::QueuePeak {
            kind: ResourceKind::Bed,
            peak: 7
        }));
        // 100 min wait against 95 min service is neither high nor low.
        assert!(!found.iter().any(|f| matches!(
            f,
            Finding::HighWait { .. }
                | Finding::LowWait {
                    kind: ResourceKind::Doctor,
                    ..
                }
        )));
        assert!(!found
            .iter()
            .any(|f| matches!(f, Finding::UrgentBypass { .. })));
    }

    #[test]
    fn test_finding_messages() {
        let finding = Finding::UrgentBypass {
            rate: 0.8,
            grade: BypassGrade::Good,
        };
        assert_eq!(finding.to_string(), "urgent MRI bypass rate 80.0% is good");
        assert!(!finding.is_concern());
    }
}
