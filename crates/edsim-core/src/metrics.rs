//! Metrics collection and the per-run summary.
//!
//! The collector is written only by the engine. Wait samples are taken per
//! grant, busy time per finished service segment, queue samples at every
//! arrival (all pools) and every release (that pool).

use edsim_logic::priority::Priority;
use edsim_logic::resources::{Capacities, PatientId, ResourceKind};
use edsim_logic::routing::{Needs, PolicyKind};
use edsim_logic::stats::{percentile, time_weighted_mean, WaitStats};
use serde::{Deserialize, Serialize};

use crate::agent::{RoutedPatient, RoutingEvaluation};
use crate::components::{PatientStatus, TaskRecord};

/// Four-hour total-time target.
pub const FOUR_HOUR_TARGET: f64 = 240.0;
/// Share of attendances that must leave within four hours.
pub const FOUR_HOUR_STANDARD: f64 = 0.95;
pub const FOUR_HOUR_INTERIM: f64 = 0.76;

#[derive(Debug, Clone, Default)]
struct ResourceLedger {
    wait_times: Vec<f64>,
    busy_time: f64,
    queue_samples: Vec<(f64, f64)>,
    grants: u64,
    resumed: u64,
    preemptions: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    ledgers: [ResourceLedger; 6],
    arrivals: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    /// One arrival; samples every pool's queue.
    pub fn record_arrival(&mut self, now: f64, queue_lengths: [u32; 6]) {
        self.arrivals += 1;
        for (ledger, len) in self.ledgers.iter_mut().zip(queue_lengths) {
            ledger.queue_samples.push((now, f64::from(len)));
        }
    }

    /// One grant; `resumed` when it continues an evicted service.
    pub fn record_grant(&mut self, kind: ResourceKind, waited: f64, resumed: bool) {
        let ledger = &mut self.ledgers[kind.index()];
        ledger.wait_times.push(waited);
        ledger.grants += 1;
        if resumed {
            ledger.resumed += 1;
        }
    }

    /// A service segment ended: completed or cut short by preemption.
    pub fn record_service(&mut self, kind: ResourceKind, served: f64) {
        self.ledgers[kind.index()].busy_time += served;
    }

    pub fn record_release(&mut self, kind: ResourceKind, now: f64, queue_len: usize) {
        self.ledgers[kind.index()]
            .queue_samples
            .push((now, queue_len as f64));
    }

    pub fn record_preemption(&mut self, kind: ResourceKind) {
        self.ledgers[kind.index()].preemptions += 1;
    }

    pub fn wait_times(&self, kind: ResourceKind) -> &[f64] {
        &self.ledgers[kind.index()].wait_times
    }

    pub fn busy_time(&self, kind: ResourceKind) -> f64 {
        self.ledgers[kind.index()].busy_time
    }

    /// Build the summary from the collected series and the patient outcomes.
    pub fn summarize(
        &self,
        run: RunContext,
        patients: &[PatientOutcome],
        routing: RoutingEvaluation,
    ) -> RunSummary {
        let resources = ResourceKind::ALL
            .iter()
            .map(|&kind| self.resource_summary(kind, &run))
            .collect();

        let mut urgent = UrgentCare::default();
        let mut compliance = Compliance::default();
        let mut by_priority = [(0usize, 0usize); 5];
        let (mut queued_at_end, mut in_service_at_end) = (0, 0);
        let mut pathways: Vec<PathwayCount> = Vec::new();
        let mut priorities = [0usize; 5];
        let mut triaged = 0;
        let mut routed = 0;
        let mut total_preemptions = 0;

        for patient in patients {
            total_preemptions += u64::from(patient.preemptions);
            match patient.status {
                PatientStatus::Queued(_) => queued_at_end += 1,
                PatientStatus::InService(_) => in_service_at_end += 1,
                _ => {}
            }
            if let Some(priority) = patient.triage {
                triaged += 1;
                priorities[priority.ordinal() as usize] += 1;
            }
            if let (Some(priority), Some(needs)) = (patient.triage, patient.needs) {
                routed += 1;
                if priority == Priority::Immediate && needs.mri {
                    urgent.immediate_mri_patients += 1;
                    if patient.tasks.first() == Some(&ResourceKind::Mri) {
                        urgent.bypassed += 1;
                    }
                }
                match pathways.iter_mut().find(|p| p.tasks == patient.tasks) {
                    Some(entry) => entry.count += 1,
                    None => pathways.push(PathwayCount {
                        tasks: patient.tasks.clone(),
                        count: 1,
                    }),
                }
            }
            if let (Some(priority), Some(done)) = (patient.triage, patient.completed_at) {
                compliance.completed += 1;
                let level = &mut by_priority[priority.ordinal() as usize];
                level.0 += 1;
                if patient.total_wait <= priority.max_wait_minutes() {
                    compliance.within_max_wait += 1;
                    level.1 += 1;
                } else {
                    compliance.max_wait_breaches += 1;
                }
                if done - patient.arrived_at <= FOUR_HOUR_TARGET {
                    compliance.within_four_hours += 1;
                } else {
                    compliance.four_hour_breaches += 1;
                }
            }
        }
        if urgent.immediate_mri_patients > 0 {
            urgent.bypass_rate = urgent.bypassed as f64 / urgent.immediate_mri_patients as f64;
        }
        compliance.overall_pct = percent(compliance.within_max_wait, compliance.completed);
        compliance.by_priority = Priority::ALL
            .iter()
            .filter_map(|&priority| {
                let (completed, within) = by_priority[priority.ordinal() as usize];
                (completed > 0).then(|| PriorityCompliance {
                    priority,
                    target_minutes: priority.max_wait_minutes(),
                    completed,
                    within_max_wait: within,
                    pct: percent(within, completed),
                })
            })
            .collect();
        pathways.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tasks.cmp(&b.tasks)));

        RunSummary {
            policy: run.policy,
            seed: run.seed,
            horizon: run.horizon,
            ended_at: run.ended_at,
            arrivals: self.arrivals,
            triaged,
            routed,
            completed: compliance.completed,
            in_system_at_end: patients.len() - compliance.completed,
            queued_at_end,
            in_service_at_end,
            resources,
            urgent_care: urgent,
            nhs: NhsIndicators::of(patients),
            compliance,
            pathways,
            priorities: Priority::ALL
                .iter()
                .map(|&priority| PriorityCount {
                    priority,
                    count: priorities[priority.ordinal() as usize],
                })
                .collect(),
            routing,
            total_preemptions,
        }
    }

    fn resource_summary(&self, kind: ResourceKind, run: &RunContext) -> ResourceSummary {
        let ledger = &self.ledgers[kind.index()];
        let capacity = run.capacities.get(kind);
        let available = run.horizon * f64::from(capacity);
        let utilization = if available > 0.0 {
            (ledger.busy_time / available).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let lengths: Vec<f64> = ledger.queue_samples.iter().map(|&(_, v)| v).collect();
        let queue_mean = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<f64>() / lengths.len() as f64
        };
        ResourceSummary {
            kind,
            capacity,
            waits: WaitStats::of(&ledger.wait_times),
            utilization,
            busy_time: ledger.busy_time,
            queue_mean,
            queue_time_average: time_weighted_mean(&ledger.queue_samples, run.ended_at),
            queue_max: lengths.iter().copied().fold(0.0, f64::max) as u32,
            grants: ledger.grants,
            resumed: ledger.resumed,
            preemptions: ledger.preemptions,
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Run-level facts the collector does not observe itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunContext {
    pub policy: PolicyKind,
    pub seed: u64,
    pub horizon: f64,
    pub ended_at: f64,
    pub capacities: Capacities,
}

/// Everything known about one patient when the run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientOutcome {
    pub id: PatientId,
    pub arrived_at: f64,
    /// Priority from triage or the record. `None` if never triaged.
    pub triage: Option<Priority>,
    /// Most urgent level queued at, after any escalation.
    pub peak: Option<Priority>,
    /// Where the patient was when the run stopped.
    pub status: PatientStatus,
    pub classified: bool,
    /// Set once the patient is routed.
    pub needs: Option<Needs>,
    pub tasks: Vec<ResourceKind>,
    pub bypassed: bool,
    pub records: Vec<TaskRecord>,
    pub preemptions: u32,
    pub completed_at: Option<f64>,
    pub total_wait: f64,
}

impl PatientOutcome {
    pub fn routed(&self) -> Option<RoutedPatient> {
        Some(RoutedPatient {
            triage: self.triage?,
            needs: self.needs?,
            tasks: self.tasks.clone(),
            bypassed: self.bypassed,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Minutes from arrival to the start of `kind`'s first visit.
    pub fn time_to(&self, kind: ResourceKind) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.kind == kind)
            .and_then(|r| r.started_at)
            .map(|start| start - self.arrived_at)
    }

    pub fn total_time(&self) -> Option<f64> {
        self.completed_at.map(|done| done - self.arrived_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    pub capacity: u32,
    pub waits: WaitStats,
    /// Busy time over horizon x capacity, in [0, 1].
    pub utilization: f64,
    pub busy_time: f64,
    pub queue_mean: f64,
    pub queue_time_average: f64,
    pub queue_max: u32,
    pub grants: u64,
    /// Grants that continued an evicted service.
    pub resumed: u64,
    pub preemptions: u64,
}

impl ResourceSummary {
    /// Services started here, not counting resumptions.
    pub fn services(&self) -> u64 {
        self.grants - self.resumed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UrgentCare {
    pub immediate_mri_patients: usize,
    /// Of those, how many went to MRI first.
    pub bypassed: usize,
    pub bypass_rate: f64,
}

/// Completed patients only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compliance {
    pub completed: usize,
    pub within_max_wait: usize,
    pub max_wait_breaches: usize,
    pub within_four_hours: usize,
    pub four_hour_breaches: usize,
    /// Percentage of completed patients within their level's max wait.
    pub overall_pct: f64,
    /// Levels with at least one completed patient, most urgent first.
    pub by_priority: Vec<PriorityCompliance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityCompliance {
    pub priority: Priority,
    pub target_minutes: f64,
    pub completed: usize,
    pub within_max_wait: usize,
    pub pct: f64,
}

/// A&E quality indicators over completed attendances. Times in minutes
/// from arrival; all zero when nobody completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NhsIndicators {
    pub attendances: usize,
    /// Mean arrival to triage start, over patients who were triaged on site.
    pub time_to_initial_assessment: f64,
    /// Mean arrival to first doctor start.
    pub time_to_treatment: f64,
    pub total_time_mean: f64,
    pub total_time_median: f64,
    pub total_time_p95: f64,
    pub within_four_hours: usize,
    pub over_four_hours: usize,
    pub four_hour_pct: f64,
    pub meets_four_hour_standard: bool,
    pub meets_interim_standard: bool,
}

impl NhsIndicators {
    pub fn of(patients: &[PatientOutcome]) -> Self {
        let completed: Vec<&PatientOutcome> =
            patients.iter().filter(|p| p.is_completed()).collect();
        if completed.is_empty() {
            return Self::default();
        }
        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let totals: Vec<f64> = completed.iter().filter_map(|p| p.total_time()).collect();
        let within = totals.iter().filter(|&&t| t <= FOUR_HOUR_TARGET).count();
        let share = within as f64 / completed.len() as f64;
        let stats = WaitStats::of(&totals);

        Self {
            attendances: completed.len(),
            time_to_initial_assessment: mean(
                completed
                    .iter()
                    .filter_map(|p| p.time_to(ResourceKind::TriageNurse))
                    .collect(),
            ),
            time_to_treatment: mean(
                completed
                    .iter()
                    .filter_map(|p| p.time_to(ResourceKind::Doctor))
                    .collect(),
            ),
            total_time_mean: stats.mean,
            total_time_median: stats.median,
            total_time_p95: percentile(&totals, 95.0),
            within_four_hours: within,
            over_four_hours: completed.len() - within,
            four_hour_pct: share * 100.0,
            meets_four_hour_standard: share >= FOUR_HOUR_STANDARD,
            meets_interim_standard: share >= FOUR_HOUR_INTERIM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayCount {
    pub tasks: Vec<ResourceKind>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub policy: PolicyKind,
    pub seed: u64,
    pub horizon: f64,
    /// Clock when the run stopped; past the horizon only when in-service
    /// tasks were allowed to finish.
    pub ended_at: f64,
    pub arrivals: u64,
    pub triaged: usize,
    pub routed: usize,
    pub completed: usize,
    pub in_system_at_end: usize,
    /// Of those still in the system, waiting in a queue.
    pub queued_at_end: usize,
    /// Of those still in the system, holding a unit.
    pub in_service_at_end: usize,
    /// One entry per kind, in `ResourceKind::ALL` order.
    pub resources: Vec<ResourceSummary>,
    pub urgent_care: UrgentCare,
    pub compliance: Compliance,
    pub nhs: NhsIndicators,
    /// Most frequent first.
    pub pathways: Vec<PathwayCount>,
    pub priorities: Vec<PriorityCount>,
    pub routing: RoutingEvaluation,
    pub total_preemptions: u64,
}

impl RunSummary {
    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceSummary> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    pub fn priority_count(&self, priority: Priority) -> usize {
        self.priorities
            .iter()
            .find(|p| p.priority == priority)
            .map_or(0, |p| p.count)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RoutingAgent;
    use edsim_logic::routing::RoutingPolicy;

    fn context(horizon: f64) -> RunContext {
        RunContext {
            policy: PolicyKind::RuleBased,
            seed: 1,
            horizon,
            ended_at: horizon,
            capacities: Capacities::default(),
        }
    }

    fn outcome(
        id: u64,
        priority: Priority,
        tasks: Vec<ResourceKind>,
        done: Option<f64>,
        wait: f64,
    ) -> PatientOutcome {
        PatientOutcome {
            id: PatientId(id),
            arrived_at: 0.0,
            triage: Some(priority),
            peak: Some(priority),
            status: if done.is_some() {
                PatientStatus::Completed
            } else {
                PatientStatus::Queued(ResourceKind::Doctor)
            },
            classified: true,
            needs: Some(Needs {
                mri: tasks.contains(&ResourceKind::Mri),
                ultrasound: tasks.contains(&ResourceKind::Ultrasound),
            }),
            tasks,
            bypassed: false,
            records: Vec::new(),
            preemptions: 0,
            completed_at: done,
            total_wait: wait,
        }
    }

    fn evaluation(patients: &[PatientOutcome]) -> RoutingEvaluation {
        let routed: Vec<RoutedPatient> = patients.iter().filter_map(|p| p.routed()).collect();
        RoutingAgent::new(RoutingPolicy::RuleBased).evaluate(&routed)
    }

    #[test]
    fn test_utilization_clipped() {
        let mut metrics = MetricsCollector::new();
        metrics.record_service(ResourceKind::Bed, 10_000.0);
        metrics.record_service(ResourceKind::Doctor, 50.0);
        let summary = metrics.summarize(context(100.0), &[], evaluation(&[]));
        assert_eq!(summary.resource(ResourceKind::Bed).unwrap().utilization, 1.0);
        let doctor = summary.resource(ResourceKind::Doctor).unwrap();
        assert!((doctor.utilization - 50.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn test_queue_samples_from_arrivals_and_releases() {
        let mut metrics = MetricsCollector::new();
        metrics.record_arrival(0.0, [0, 2, 0, 0, 0, 0]);
        metrics.record_release(ResourceKind::Doctor, 10.0, 4);
        let summary = metrics.summarize(context(20.0), &[], evaluation(&[]));
        let doctor = summary.resource(ResourceKind::Doctor).unwrap();
        assert_eq!(doctor.queue_mean, 3.0);
        assert_eq!(doctor.queue_max, 4);
        assert!((doctor.queue_time_average - 3.0).abs() < 1e-12);
        assert_eq!(summary.arrivals, 1);
    }

    #[test]
    fn test_compliance_counts_completed_only() {
        use edsim_logic::resources::ResourceKind::*;
        let patients = vec![
            outcome(0, Priority::Urgent, vec![Doctor, Bed], Some(200.0), 30.0),
            outcome(1, Priority::VeryUrgent, vec![Doctor, Bed], Some(300.0), 25.0),
            outcome(2, Priority::Standard, vec![Doctor, Mri, Bed], None, 500.0),
        ];
        let summary =
            MetricsCollector::new().summarize(context(1000.0), &patients, evaluation(&patients));
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.in_system_at_end, 1);
        assert_eq!(summary.compliance.within_max_wait, 1);
        assert_eq!(summary.compliance.max_wait_breaches, 1);
        assert_eq!(summary.compliance.within_four_hours, 1);
        assert_eq!(summary.compliance.four_hour_breaches, 1);
        assert_eq!(summary.pathways[0].tasks, vec![Doctor, Bed]);
        assert_eq!(summary.pathways[0].count, 2);
        assert_eq!(summary.priority_count(Priority::Urgent), 1);
        assert_eq!(summary.queued_at_end, 1);
        assert_eq!(summary.in_service_at_end, 0);
    }

    #[test]
    fn test_compliance_by_priority() {
        use edsim_logic::resources::ResourceKind::*;
        let patients = vec![
            outcome(0, Priority::Urgent, vec![Doctor, Bed], Some(100.0), 30.0),
            outcome(1, Priority::Urgent, vec![Doctor, Bed], Some(100.0), 90.0),
            outcome(2, Priority::Standard, vec![Doctor, Bed], Some(100.0), 90.0),
            outcome(3, Priority::Immediate, vec![Doctor, Bed], None, 0.0),
        ];
        let summary =
            MetricsCollector::new().summarize(context(1000.0), &patients, evaluation(&patients));
        let compliance = &summary.compliance;
        assert!((compliance.overall_pct - 200.0 / 3.0).abs() < 1e-9);
        let levels: Vec<Priority> = compliance.by_priority.iter().map(|c| c.priority).collect();
        assert_eq!(levels, vec![Priority::Urgent, Priority::Standard]);
        let urgent = compliance.by_priority[0];
        assert_eq!(urgent.target_minutes, 60.0);
        assert_eq!((urgent.completed, urgent.within_max_wait), (2, 1));
        assert_eq!(urgent.pct, 50.0);
        assert_eq!(compliance.by_priority[1].pct, 100.0);
    }

    #[test]
    fn test_nhs_indicators() {
        use edsim_logic::resources::ResourceKind::*;
        let record = |kind, requested_at, started_at| TaskRecord {
            started_at: Some(started_at),
            ..TaskRecord::new(kind, requested_at)
        };
        let mut patients: Vec<PatientOutcome> = (0..20)
            .map(|i| {
                let mut p = outcome(i, Priority::Standard, vec![Doctor, Bed], Some(100.0), 0.0);
                p.records = vec![record(TriageNurse, 0.0, 4.0), record(Doctor, 10.0, 30.0)];
                p
            })
            .collect();
        // Pre-triaged and over four hours.
        patients[0].records.remove(0);
        patients[0].completed_at = Some(300.0);
        patients.push(outcome(99, Priority::Standard, vec![Doctor, Bed], None, 0.0));

        let nhs = NhsIndicators::of(&patients);
        assert_eq!(nhs.attendances, 20);
        assert_eq!(nhs.time_to_initial_assessment, 4.0);
        assert_eq!(nhs.time_to_treatment, 30.0);
        assert_eq!(nhs.total_time_median, 100.0);
        assert!((nhs.total_time_mean - 110.0).abs() < 1e-9);
        assert!((nhs.total_time_p95 - 110.0).abs() < 1e-9);
        assert_eq!((nhs.within_four_hours, nhs.over_four_hours), (19, 1));
        assert!((nhs.four_hour_pct - 95.0).abs() < 1e-9);
        assert!(nhs.meets_four_hour_standard);
        assert!(nhs.meets_interim_standard);

        assert_eq!(NhsIndicators::of(&patients[20..]), NhsIndicators::default());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = MetricsCollector::new().summarize(context(10.0), &[], evaluation(&[]));
        let json = summary.to_json_pretty().unwrap();
        assert!(json.contains("\"urgent_care\""));
    }
}
