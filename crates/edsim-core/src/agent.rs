//! Routing agent: turns a triaged patient into a task list, and grades its
//! own bypass behaviour over a finished run.

use edsim_logic::priority::Priority;
use edsim_logic::resources::ResourceKind;
use edsim_logic::routing::{plan_pathway, Needs, PathwayClass, PolicyKind, RoutingPolicy};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub tasks: Vec<ResourceKind>,
    /// First task is imaging, skipping the doctor.
    pub bypassed: bool,
    /// IMMEDIATE with an MRI need, whatever the policy.
    pub eligible: bool,
}

/// What the agent needs to know about a routed patient after the run.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPatient {
    pub triage: Priority,
    pub needs: Needs,
    pub tasks: Vec<ResourceKind>,
    pub bypassed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayClassCount {
    pub class: PathwayClass,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagingCounts {
    pub mri_only: usize,
    pub ultrasound_only: usize,
    pub both: usize,
    pub none: usize,
}

/// Agent self-assessment over routed patients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEvaluation {
    pub policy: PolicyKind,
    pub set_point: f64,
    /// IMMEDIATE patients with an MRI need.
    pub eligible: usize,
    pub bypassed: usize,
    /// `bypassed / eligible`, 0 with no eligible patients.
    pub empirical_rate: f64,
    /// `|empirical_rate - set_point|`.
    pub difference: f64,
    pub pathways: Vec<PathwayClassCount>,
    /// Counts in `Priority::ALL` order.
    pub triage: [usize; 5],
    pub imaging: ImagingCounts,
    pub total_patients: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingAgent {
    policy: RoutingPolicy,
}

impl RoutingAgent {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Plan a pathway. Draws one uniform from `rng` only for eligible
    /// patients under an agent policy.
    pub fn route(&self, priority: Priority, needs: Needs, rng: &mut dyn RngCore) -> RouteDecision {
        let eligible = priority == Priority::Immediate && needs.mri;
        let tasks = plan_pathway(&self.policy, priority, needs, || rng.gen::<f64>());
        let bypassed = tasks.first() != Some(&ResourceKind::Doctor);
        RouteDecision {
            tasks,
            bypassed,
            eligible,
        }
    }

    pub fn evaluate(&self, patients: &[RoutedPatient]) -> RoutingEvaluation {
        let mut eligible = 0;
        let mut bypassed = 0;
        let mut triage = [0usize; 5];
        let mut imaging = ImagingCounts::default();
        let mut classes: Vec<PathwayClassCount> = Vec::new();

        for patient in patients {
            if patient.triage == Priority::Immediate && patient.needs.mri {
                eligible += 1;
                if patient.bypassed {
                    bypassed += 1;
                }
            }
            triage[patient.triage.ordinal() as usize] += 1;
            match (patient.needs.mri, patient.needs.ultrasound) {
                (true, true) => imaging.both += 1,
                (true, false) => imaging.mri_only += 1,
                (false, true) => imaging.ultrasound_only += 1,
                (false, false) => imaging.none += 1,
            }
            let class = PathwayClass::of(&patient.tasks);
            match classes.iter_mut().find(|c| c.class == class) {
                Some(entry) => entry.count += 1,
                None => classes.push(PathwayClassCount { class, count: 1 }),
            }
        }
        classes.sort_by_key(|c| c.class);

        let set_point = self.policy.set_point();
        let empirical_rate = if eligible > 0 {
            bypassed as f64 / eligible as f64
        } else {
            0.0
        };

        RoutingEvaluation {
            policy: self.policy.kind(),
            set_point,
            eligible,
            bypassed,
            empirical_rate,
            difference: (empirical_rate - set_point).abs(),
            pathways: classes,
            triage,
            imaging,
            total_patients: patients.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use edsim_logic::resources::ResourceKind::*;

    const MRI: Needs = Needs {
        mri: true,
        ultrasound: false,
    };

    #[test]
    fn test_rule_based_never_bypasses() {
        let agent = RoutingAgent::new(RoutingPolicy::RuleBased);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = agent.route(Priority::Immediate, MRI, &mut rng);
            assert_eq!(d.tasks, vec![Doctor, Mri, Bed]);
            assert!(!d.bypassed);
            assert!(d.eligible);
        }
    }

    #[test]
    fn test_agent_draws_only_for_eligible() {
        let agent = RoutingAgent::new(RoutingPolicy::SingleAgent { p_bypass: 1.0 });
        let mut rng = StdRng::seed_from_u64(1);
        let mut reference = StdRng::seed_from_u64(1);
        let d = agent.route(Priority::Urgent, MRI, &mut rng);
        assert_eq!(d.tasks[0], Doctor);
        // No draw happened, so both streams are still aligned.
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());

        let d = agent.route(Priority::Immediate, MRI, &mut rng);
        assert_eq!(d.tasks, vec![Mri, Bed]);
        assert!(d.bypassed);
    }

    #[test]
    fn test_bypass_rate_converges() {
        let agent = RoutingAgent::new(RoutingPolicy::SingleAgent { p_bypass: 0.8 });
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let patients: Vec<RoutedPatient> = (0..n)
            .map(|_| {
                let d = agent.route(Priority::Immediate, MRI, &mut rng);
                RoutedPatient {
                    triage: Priority::Immediate,
                    needs: MRI,
                    tasks: d.tasks,
                    bypassed: d.bypassed,
                }
            })
            .collect();
        let eval = agent.evaluate(&patients);
        assert_eq!(eval.eligible, n);
        assert!(eval.difference <= 0.02, "{}", eval.empirical_rate);
        assert_eq!(eval.imaging.mri_only, n);
    }

    #[test]
    fn test_evaluation_histograms() {
        let agent = RoutingAgent::new(RoutingPolicy::RuleBased);
        let patients = vec![
            RoutedPatient {
                triage: Priority::Standard,
                needs: Needs::default(),
                tasks: vec![Doctor, Bed],
                bypassed: false,
            },
            RoutedPatient {
                triage: Priority::Urgent,
                needs: Needs {
                    mri: true,
                    ultrasound: true,
                },
                tasks: vec![Doctor, Mri, Ultrasound, Bed],
                bypassed: false,
            },
        ];
        let eval = agent.evaluate(&patients);
        assert_eq!(eval.eligible, 0);
        assert_eq!(eval.empirical_rate, 0.0);
        assert_eq!(eval.triage, [0, 0, 1, 1, 0]);
        assert_eq!(eval.imaging.both, 1);
        assert_eq!(eval.imaging.none, 1);
        assert_eq!(
            eval.pathways,
            vec![
                PathwayClassCount {
                    class: PathwayClass::DoctorOnly,
                    count: 1
                },
                PathwayClassCount {
                    class: PathwayClass::DoctorBothImagingBed,
                    count: 1
                },
            ]
        );
    }
}
