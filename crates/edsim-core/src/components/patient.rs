//! Patient components: admission, presentation, acuity, pathway, journey.

use edsim_logic::config::PatientRecord;
use edsim_logic::priority::Priority;
use edsim_logic::resources::{PatientId, ResourceKind};
use edsim_logic::routing::Needs;
use serde::{Deserialize, Serialize};

/// Identity and arrival time. Present on every patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Admission {
    pub id: PatientId,
    pub arrived_at: f64,
}

/// What the patient arrived with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub record: PatientRecord,
}

/// Fixed service durations that replace sampling, per resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOverrides {
    minutes: [Option<f64>; 6],
}

impl ServiceOverrides {
    pub fn get(&self, kind: ResourceKind) -> Option<f64> {
        self.minutes[kind.index()]
    }

    pub fn with(mut self, kind: ResourceKind, minutes: f64) -> Self {
        self.minutes[kind.index()] = Some(minutes);
        self
    }
}

/// Priority assigned once at triage. Every task queues at it; only a
/// resumed service after eviction waits one level higher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Acuity {
    pub triage: Priority,
    /// Most urgent level the patient has queued at.
    pub peak: Priority,
    /// False when the label came with the record.
    pub classified: bool,
}

/// Routed task list. Immutable once dispatched; only the cursor moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pathway {
    pub tasks: Vec<ResourceKind>,
    pub needs: Needs,
    pub bypassed: bool,
    pub next: usize,
}

impl Pathway {
    pub fn current(&self) -> Option<ResourceKind> {
        self.tasks.get(self.next).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientStatus {
    Arrived,
    Queued(ResourceKind),
    InService(ResourceKind),
    /// Finished this task after the horizon with more of the pathway left.
    Stopped(ResourceKind),
    Completed,
}

/// Timestamps for one visit to one resource.
///
/// A preempted task keeps its first request and start; `end` is written
/// once, when the last segment finishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub kind: ResourceKind,
    pub requested_at: f64,
    pub started_at: Option<f64>,
    pub ended_at: Option<f64>,
    /// Sum of every grant's wait for this task.
    pub waited: f64,
    pub segments: u32,
}

impl TaskRecord {
    pub fn new(kind: ResourceKind, requested_at: f64) -> Self {
        Self {
            kind,
            requested_at,
            started_at: None,
            ended_at: None,
            waited: 0.0,
            segments: 0,
        }
    }
}

/// Mutable progress through the department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub status: PatientStatus,
    pub preemptions: u32,
    /// Triage first (when performed), then one record per pathway task.
    pub records: Vec<TaskRecord>,
    pub completed_at: Option<f64>,
}

impl Default for Journey {
    fn default() -> Self {
        Self {
            status: PatientStatus::Arrived,
            preemptions: 0,
            records: Vec::new(),
            completed_at: None,
        }
    }
}

impl Journey {
    pub fn total_wait(&self) -> f64 {
        self.records.iter().map(|r| r.waited).sum()
    }

    /// The open record for `kind`, if the patient is currently on it.
    pub fn open_record_mut(&mut self, kind: ResourceKind) -> Option<&mut TaskRecord> {
        self.records
            .iter_mut()
            .rev()
            .find(|r| r.kind == kind && r.ended_at.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_per_kind() {
        let o = ServiceOverrides::default().with(ResourceKind::Doctor, 30.0);
        assert_eq!(o.get(ResourceKind::Doctor), Some(30.0));
        assert_eq!(o.get(ResourceKind::Bed), None);
    }

    #[test]
    fn test_journey_total_wait() {
        let mut j = Journey::default();
        let mut a = TaskRecord::new(ResourceKind::TriageNurse, 0.0);
        a.waited = 3.0;
        let mut b = TaskRecord::new(ResourceKind::Doctor, 10.0);
        b.waited = 4.5;
        j.records.push(a);
        j.records.push(b);
        assert_eq!(j.total_wait(), 7.5);
        assert!(j.open_record_mut(ResourceKind::Doctor).is_some());
        assert!(j.open_record_mut(ResourceKind::Bed).is_none());
    }

    #[test]
    fn test_pathway_cursor() {
        let p = Pathway {
            tasks: vec![ResourceKind::Doctor, ResourceKind::Bed],
            needs: Needs::default(),
            bypassed: false,
            next: 1,
        };
        assert_eq!(p.current(), Some(ResourceKind::Bed));
    }
}
