//! Resource pools with priority queues and optional preemption.
//!
//! Waiters are keyed by (priority ordinal, sequence). Tail inserts take
//! increasing positive sequence numbers; head inserts take decreasing
//! negative ones, so a re-queued victim sits ahead of every waiter at its
//! level while strict priority order across levels is kept.

use std::collections::BTreeMap;

use edsim_logic::priority::Priority;
use edsim_logic::resources::{PatientId, ResourceKind};
use serde::{Deserialize, Serialize};

/// Identifies one grant of one unit. Stale after release or eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrantId(pub u64);

/// A unit in use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceSlot {
    pub grant: GrantId,
    pub patient: PatientId,
    /// Level the unit was granted at.
    pub priority: Priority,
    /// Triage level; escalation after eviction is computed from it.
    pub triage: Priority,
    pub started_at: f64,
    pub expected_end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Waiter {
    patient: PatientId,
    priority: Priority,
    triage: Priority,
    requested_at: f64,
    duration: f64,
    resumed: bool,
}

/// A unit handed to a patient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grant {
    pub slot: ServiceSlot,
    pub requested_at: f64,
    pub waited: f64,
    /// True when this grant resumes a preempted service.
    pub resumed: bool,
}

/// The patient pushed out of service by a preemption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eviction {
    pub patient: PatientId,
    pub grant: GrantId,
    pub priority_before: Priority,
    pub requeued_as: Priority,
    pub served: f64,
    pub residual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestOutcome {
    Granted(Grant),
    Preempted { grant: Grant, eviction: Eviction },
    Queued,
}

#[derive(Debug, Clone)]
pub struct ResourcePool {
    kind: ResourceKind,
    capacity: u32,
    preemptible: bool,
    in_service: Vec<ServiceSlot>,
    waiting: BTreeMap<(u8, i64), Waiter>,
    next_tail: i64,
    next_head: i64,
    next_grant: u64,
}

impl ResourcePool {
    pub fn new(kind: ResourceKind, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            preemptible: kind.preemptible(),
            in_service: Vec::with_capacity(capacity as usize),
            waiting: BTreeMap::new(),
            next_tail: 0,
            next_head: -1,
            next_grant: 0,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_preemptible(&self) -> bool {
        self.preemptible
    }

    pub fn in_service(&self) -> &[ServiceSlot] {
        &self.in_service
    }

    pub fn in_service_len(&self) -> usize {
        self.in_service.len()
    }

    pub fn queue_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn free(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.in_service.len())
    }

    /// Waiting patients in grant order.
    pub fn waiting(&self) -> impl Iterator<Item = (PatientId, Priority)> + '_ {
        self.waiting.values().map(|w| (w.patient, w.priority))
    }

    /// Ask for a unit for `duration` minutes, queueing at `priority`.
    ///
    /// Grants at once when a unit is free. Otherwise, on a preemptible pool,
    /// evicts the least urgent patient in service (latest grant on ties) if
    /// the newcomer strictly outranks it and nobody waiting is at least as
    /// urgent as the newcomer. Otherwise queues at the tail of its level.
    ///
    /// An evicted patient waits one level above its `triage` priority, so
    /// repeated evictions never stack.
    pub fn request(
        &mut self,
        patient: PatientId,
        priority: Priority,
        triage: Priority,
        now: f64,
        duration: f64,
    ) -> RequestOutcome {
        let waiter = Waiter {
            patient,
            priority,
            triage,
            requested_at: now,
            duration,
            resumed: false,
        };

        if self.free() > 0 {
            return RequestOutcome::Granted(self.start(waiter, now));
        }

        if let Some(index) = self.victim_for(priority) {
            let victim = self.in_service.remove(index);
            let requeued_as = victim.triage.escalate();
            let eviction = Eviction {
                patient: victim.patient,
                grant: victim.grant,
                priority_before: victim.priority,
                requeued_as,
                served: now - victim.started_at,
                residual: (victim.expected_end - now).max(0.0),
            };
            self.push_head(Waiter {
                patient: victim.patient,
                priority: requeued_as,
                triage: victim.triage,
                requested_at: now,
                duration: eviction.residual,
                resumed: true,
            });
            let grant = self.start(waiter, now);
            return RequestOutcome::Preempted { grant, eviction };
        }

        self.push_tail(waiter);
        RequestOutcome::Queued
    }

    fn victim_for(&self, priority: Priority) -> Option<usize> {
        if !self.preemptible {
            return None;
        }
        let blocked = self
            .waiting
            .keys()
            .next()
            .is_some_and(|&(ordinal, _)| ordinal <= priority.ordinal());
        if blocked {
            return None;
        }
        self.in_service
            .iter()
            .enumerate()
            .filter(|(_, slot)| priority.outranks(slot.priority))
            .max_by_key(|(_, slot)| (slot.priority, slot.grant))
            .map(|(index, _)| index)
    }

    /// Return a unit. `None` when the grant is no longer in service.
    pub fn release(&mut self, grant: GrantId) -> Option<ServiceSlot> {
        let index = self.in_service.iter().position(|s| s.grant == grant)?;
        Some(self.in_service.remove(index))
    }

    /// Hand a free unit to the head of the queue.
    pub fn grant_next(&mut self, now: f64) -> Option<Grant> {
        if self.free() == 0 {
            return None;
        }
        let (_, waiter) = self.waiting.pop_first()?;
        Some(self.start(waiter, now))
    }

    fn start(&mut self, waiter: Waiter, now: f64) -> Grant {
        let grant = GrantId(self.next_grant);
        self.next_grant += 1;
        let slot = ServiceSlot {
            grant,
            patient: waiter.patient,
            priority: waiter.priority,
            triage: waiter.triage,
            started_at: now,
            expected_end: now + waiter.duration,
        };
        self.in_service.push(slot);
        Grant {
            slot,
            requested_at: waiter.requested_at,
            waited: now - waiter.requested_at,
            resumed: waiter.resumed,
        }
    }

    fn push_tail(&mut self, waiter: Waiter) {
        self.waiting
            .insert((waiter.priority.ordinal(), self.next_tail), waiter);
        self.next_tail += 1;
    }

    fn push_head(&mut self, waiter: Waiter) {
        self.waiting
            .insert((waiter.priority.ordinal(), self.next_head), waiter);
        self.next_head -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edsim_logic::priority::Priority::*;

    fn granted(outcome: RequestOutcome) -> Grant {
        match outcome {
            RequestOutcome::Granted(g) => g,
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[test]
    fn test_grants_until_full_then_queues() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 2);
        granted(pool.request(PatientId(0), Standard, Standard, 0.0, 10.0));
        granted(pool.request(PatientId(1), Standard, Standard, 0.0, 10.0));
        assert_eq!(
            pool.request(PatientId(2), Standard, Standard, 1.0, 10.0),
            RequestOutcome::Queued
        );
        assert_eq!(pool.in_service_len(), 2);
        assert_eq!(pool.queue_len(), 1);
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let mut pool = ResourcePool::new(ResourceKind::Bed, 1);
        let first = granted(pool.request(PatientId(0), NonUrgent, NonUrgent, 0.0, 100.0));
        pool.request(PatientId(1), Standard, Standard, 1.0, 5.0);
        pool.request(PatientId(2), Urgent, Urgent, 2.0, 5.0);
        pool.request(PatientId(3), Standard, Standard, 3.0, 5.0);
        pool.request(PatientId(4), Urgent, Urgent, 4.0, 5.0);
        let order: Vec<u64> = pool.waiting().map(|(p, _)| p.0).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);

        assert!(pool.release(first.slot.grant).is_some());
        let next = pool.grant_next(100.0).unwrap();
        assert_eq!(next.slot.patient, PatientId(2));
        assert_eq!(next.waited, 98.0);
    }

    #[test]
    fn test_bed_never_evicts() {
        let mut pool = ResourcePool::new(ResourceKind::Bed, 1);
        granted(pool.request(PatientId(0), Standard, Standard, 0.0, 300.0));
        let outcome = pool.request(PatientId(1), Immediate, Immediate, 10.0, 50.0);
        assert_eq!(outcome, RequestOutcome::Queued);
        assert_eq!(pool.in_service()[0].patient, PatientId(0));
    }

    #[test]
    fn test_preemption_requeues_victim_at_head_escalated() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 2);
        granted(pool.request(PatientId(0), NonUrgent, NonUrgent, 0.0, 30.0));
        granted(pool.request(PatientId(1), NonUrgent, NonUrgent, 0.0, 30.0));
        // Patient 1 is evicted and waits at Standard.
        assert!(matches!(
            pool.request(PatientId(2), Standard, Standard, 0.5, 30.0),
            RequestOutcome::Preempted { .. }
        ));
        // A less urgent waiter does not block preemption.
        let outcome = pool.request(PatientId(3), VeryUrgent, VeryUrgent, 1.0, 10.0);
        let (grant, eviction) = match outcome {
            RequestOutcome::Preempted { grant, eviction } => (grant, eviction),
            other => panic!("expected preemption, got {other:?}"),
        };
        assert_eq!(grant.slot.patient, PatientId(3));
        assert_eq!(eviction.patient, PatientId(0));
        assert_eq!(eviction.priority_before, NonUrgent);
        assert_eq!(eviction.requeued_as, Standard);
        assert_eq!(eviction.served, 1.0);
        assert_eq!(eviction.residual, 29.0);
        // Latest victim sits ahead of the earlier one at the same level.
        let order: Vec<u64> = pool.waiting().map(|(p, _)| p.0).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_no_preemption_past_equal_waiter() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 2);
        granted(pool.request(PatientId(0), Standard, Standard, 0.0, 30.0));
        granted(pool.request(PatientId(1), Standard, Standard, 0.5, 30.0));
        // Patient 1 is evicted and waits at Urgent.
        assert!(matches!(
            pool.request(PatientId(2), Urgent, Urgent, 1.0, 10.0),
            RequestOutcome::Preempted { .. }
        ));
        // Patient 0 is still a valid victim, but patient 1 waits at the same level.
        assert_eq!(
            pool.request(PatientId(3), Urgent, Urgent, 2.0, 10.0),
            RequestOutcome::Queued
        );
        let order: Vec<u64> = pool.waiting().map(|(p, _)| p.0).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn test_victim_is_least_urgent_latest_grant() {
        let mut pool = ResourcePool::new(ResourceKind::Mri, 3);
        granted(pool.request(PatientId(0), Standard, Standard, 0.0, 30.0));
        granted(pool.request(PatientId(1), Urgent, Urgent, 1.0, 30.0));
        granted(pool.request(PatientId(2), Standard, Standard, 2.0, 30.0));
        match pool.request(PatientId(3), Immediate, Immediate, 3.0, 30.0) {
            RequestOutcome::Preempted { eviction, .. } => {
                assert_eq!(eviction.patient, PatientId(2))
            }
            other => panic!("expected preemption, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_priority_never_preempts() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 1);
        granted(pool.request(PatientId(0), Immediate, Immediate, 0.0, 30.0));
        assert_eq!(
            pool.request(PatientId(1), Immediate, Immediate, 1.0, 10.0),
            RequestOutcome::Queued
        );
    }

    #[test]
    fn test_stale_release_is_none() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 1);
        let g = granted(pool.request(PatientId(0), Standard, Standard, 0.0, 30.0));
        pool.request(PatientId(1), Immediate, Immediate, 1.0, 10.0);
        assert!(pool.release(g.slot.grant).is_none());
    }

    #[test]
    fn test_resumed_grant_carries_residual() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 1);
        granted(pool.request(PatientId(0), Standard, Standard, 0.0, 30.0));
        let grant = match pool.request(PatientId(1), Immediate, Immediate, 1.0, 10.0) {
            RequestOutcome::Preempted { grant, .. } => grant,
            other => panic!("expected preemption, got {other:?}"),
        };
        pool.release(grant.slot.grant);
        let resumed = pool.grant_next(11.0).unwrap();
        assert!(resumed.resumed);
        assert_eq!(resumed.slot.patient, PatientId(0));
        assert_eq!(resumed.slot.priority, Urgent);
        assert_eq!(resumed.slot.expected_end, 40.0);
        assert_eq!(resumed.waited, 10.0);
    }

    #[test]
    fn test_repeated_eviction_does_not_stack() {
        let mut pool = ResourcePool::new(ResourceKind::Doctor, 1);
        granted(pool.request(PatientId(0), Standard, Standard, 0.0, 100.0));
        let first = match pool.request(PatientId(1), Immediate, Immediate, 1.0, 10.0) {
            RequestOutcome::Preempted { grant, eviction } => {
                assert_eq!(eviction.requeued_as, Urgent);
                grant
            }
            other => panic!("expected preemption, got {other:?}"),
        };
        pool.release(first.slot.grant);
        let resumed = pool.grant_next(11.0).unwrap();
        assert_eq!(resumed.slot.priority, Urgent);
        assert_eq!(resumed.slot.triage, Standard);

        // Evicted again while resumed at Urgent: still triage plus one.
        match pool.request(PatientId(2), Immediate, Immediate, 12.0, 10.0) {
            RequestOutcome::Preempted { eviction, .. } => {
                assert_eq!(eviction.patient, PatientId(0));
                assert_eq!(eviction.priority_before, Urgent);
                assert_eq!(eviction.requeued_as, Urgent);
                assert_eq!(eviction.residual, 98.0);
            }
            other => panic!("expected preemption, got {other:?}"),
        }
        let waiting: Vec<(PatientId, Priority)> = pool.waiting().collect();
        assert_eq!(waiting, vec![(PatientId(0), Urgent)]);
    }
}
