//! Simulation engine - drives patients through the department.
//!
//! A single-threaded discrete-event loop. Events sit in a min-heap keyed by
//! (time, scheduling order), so events at the same instant run in the order
//! they were scheduled. Every patient is a small state machine advanced by
//! its own events: arrival, then one grant/service-end pair per task.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use edsim_logic::config::{
    ConfigError, NeedModel, PatientSourceConfig, SimulationConfig, Termination,
};
use edsim_logic::fuzzy::FuzzyRegistry;
use edsim_logic::mts::{default_rules, MtsClassifier};
use edsim_logic::priority::Priority;
use edsim_logic::resources::{PatientId, ResourceKind};
use edsim_logic::routing::Needs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agent::{RoutedPatient, RoutingAgent};
use crate::components::*;
use crate::error::SimError;
use crate::metrics::{MetricsCollector, PatientOutcome, RunContext, RunSummary};
use crate::pool::{Eviction, Grant, GrantId, RequestOutcome, ResourcePool};
use crate::registry::PatientRegistry;
use crate::sampler::ServiceSampler;
use crate::source::{Arrival, ExternalSource, PatientSource, ScriptedSource, SyntheticSource};
use crate::trace::{EventPayload, EventTrace};

#[derive(Debug)]
enum Event {
    Arrival(Arrival),
    ServiceEnd {
        kind: ResourceKind,
        grant: GrantId,
        patient: PatientId,
    },
}

#[derive(Debug)]
struct Scheduled {
    at: f64,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Scheduled {}
impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Scheduled {
    // Reversed: BinaryHeap is a max-heap and the earliest event must pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Whether the loop keeps going after a step.
enum Flow {
    Continue,
    HorizonReached,
}

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// One entry per arrival, in id order.
    pub patients: Vec<PatientOutcome>,
    /// Present when `record_trace` was set.
    pub trace: Option<EventTrace>,
}

/// Main simulation engine
pub struct EdSimulation {
    config: SimulationConfig,
    classifier: MtsClassifier,
    agent: RoutingAgent,
    sampler: ServiceSampler,
    needs: NeedModel,
    source: Box<dyn PatientSource>,
    rng: StdRng,
    pools: Vec<ResourcePool>,
    patients: PatientRegistry,
    metrics: MetricsCollector,
    queue: BinaryHeap<Scheduled>,
    next_seq: u64,
    clock: f64,
    /// Past the horizon while in-service tasks finish.
    closing: bool,
    trace: Option<EventTrace>,
}

impl EdSimulation {
    /// Validate the configuration and build the configured patient source.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.check()?;
        let registry = FuzzyRegistry::manchester()?;
        let rate = config.arrival_rate_per_hour;
        let source: Box<dyn PatientSource> = match &config.patient_source {
            PatientSourceConfig::Synthetic { .. } => Box::new(SyntheticSource::new(rate)?),
            PatientSourceConfig::External { records, .. } => Box::new(ExternalSource::new(
                records.clone(),
                rate,
                &registry,
                &config.capacities,
            )?),
        };
        Self::build(config, &registry, source)
    }

    /// Run with a caller-supplied source. The configured source is ignored
    /// except for its need model.
    pub fn with_source<S: PatientSource + 'static>(
        config: SimulationConfig,
        source: S,
    ) -> Result<Self, SimError> {
        if let Some(err) = config.validate_settings().into_iter().next() {
            return Err(err.into());
        }
        let needs = config.patient_source.needs();
        for (name, value) in [
            ("p_mri", needs.mri.probability()),
            ("p_ultrasound", needs.p_ultrasound),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value }.into());
            }
        }
        let registry = FuzzyRegistry::manchester()?;
        Self::build(config, &registry, Box::new(source))
    }

    /// Scripted arrivals only.
    pub fn scripted(config: SimulationConfig, arrivals: Vec<Arrival>) -> Result<Self, SimError> {
        Self::with_source(config, ScriptedSource::new(arrivals))
    }

    fn build(
        config: SimulationConfig,
        registry: &FuzzyRegistry,
        source: Box<dyn PatientSource>,
    ) -> Result<Self, SimError> {
        let classifier = MtsClassifier::new(registry, &default_rules(), config.priority_weights)?;
        let sampler = ServiceSampler::new(config.service_times)?;
        let pools = ResourceKind::ALL
            .iter()
            .map(|&kind| ResourcePool::new(kind, config.capacities.get(kind)))
            .collect();
        let trace = config.record_trace.then(EventTrace::new);

        Ok(Self {
            agent: RoutingAgent::new(config.routing_policy()),
            needs: *config.patient_source.needs(),
            rng: StdRng::seed_from_u64(config.seed),
            classifier,
            sampler,
            source,
            pools,
            patients: PatientRegistry::new(),
            metrics: MetricsCollector::new(),
            queue: BinaryHeap::new(),
            next_seq: 0,
            clock: 0.0,
            closing: false,
            trace,
            config,
        })
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn pool(&self, kind: ResourceKind) -> &ResourcePool {
        &self.pools[kind.index()]
    }

    /// Run to the horizon and summarize.
    pub fn run(mut self) -> Result<RunOutcome, SimError> {
        log::info!(
            "starting run: policy={} horizon={} rate={}/h seed={}",
            self.config.policy,
            self.config.horizon_minutes,
            self.config.arrival_rate_per_hour,
            self.config.seed
        );
        self.schedule_next_arrival()?;
        while let Flow::Continue = self.step()? {}
        let outcome = self.finish();
        log::info!(
            "run finished at t={:.1}: {} arrivals, {} completed, {} preemptions",
            outcome.summary.ended_at,
            outcome.summary.arrivals,
            outcome.summary.completed,
            outcome.summary.total_preemptions
        );
        Ok(outcome)
    }

    fn step(&mut self) -> Result<Flow, SimError> {
        let Some(Scheduled { at, event, .. }) = self.queue.pop() else {
            return Ok(Flow::HorizonReached);
        };

        if at >= self.config.horizon() {
            match self.config.termination {
                Termination::Truncate => return Ok(Flow::HorizonReached),
                Termination::FinishCurrentTask => {
                    if !self.closing {
                        log::debug!("horizon reached at t={at:.2}; finishing in-service tasks");
                    }
                    self.closing = true;
                    if matches!(event, Event::Arrival(_)) {
                        return Ok(Flow::Continue);
                    }
                }
            }
        }

        if at < self.clock {
            return Err(SimError::invariant(
                self.clock,
                None,
                None,
                format!("event scheduled at {at} is in the past"),
            ));
        }
        self.clock = at;

        match event {
            Event::Arrival(arrival) => self.on_arrival(arrival)?,
            Event::ServiceEnd {
                kind,
                grant,
                patient,
            } => self.on_service_end(kind, grant, patient)?,
        }
        self.check_pools()?;
        Ok(Flow::Continue)
    }

    fn schedule(&mut self, at: f64, event: Event) {
        self.queue.push(Scheduled {
            at,
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    fn schedule_next_arrival(&mut self) -> Result<(), SimError> {
        if let Some(arrival) = self.source.next_arrival(&mut self.rng) {
            if !(arrival.at >= self.clock) {
                return Err(SimError::invariant(
                    self.clock,
                    None,
                    None,
                    format!("source produced an arrival at {}", arrival.at),
                ));
            }
            self.schedule(arrival.at, Event::Arrival(arrival));
        }
        Ok(())
    }

    fn emit(
        &mut self,
        patient: Option<PatientId>,
        resource: Option<ResourceKind>,
        payload: impl FnOnce() -> EventPayload,
    ) {
        let clock = self.clock;
        if let Some(trace) = self.trace.as_mut() {
            trace.push(clock, patient, resource, payload());
        }
    }

    fn violation(&self, patient: PatientId, kind: Option<ResourceKind>, detail: &str) -> SimError {
        SimError::invariant(self.clock, Some(patient), kind, detail)
    }

    fn with_journey<R>(
        &self,
        id: PatientId,
        kind: Option<ResourceKind>,
        f: impl FnOnce(&mut Journey) -> R,
    ) -> Result<R, SimError> {
        self.patients
            .update::<Journey, R>(id, f)
            .ok_or_else(|| self.violation(id, kind, "unknown patient"))
    }

    fn acuity(&self, id: PatientId, kind: Option<ResourceKind>) -> Result<Acuity, SimError> {
        self.patients
            .get::<Acuity>(id)
            .ok_or_else(|| self.violation(id, kind, "patient has no priority"))
    }

    // ── Arrivals and triage ────────────────────────────────────────────

    fn on_arrival(&mut self, arrival: Arrival) -> Result<(), SimError> {
        let preassigned = arrival.record.priority;
        let id = self.patients.admit(arrival);

        let mut queue_lengths = [0u32; 6];
        for (slot, pool) in queue_lengths.iter_mut().zip(&self.pools) {
            *slot = pool.queue_len() as u32;
        }
        self.metrics.record_arrival(self.clock, queue_lengths);
        self.emit(Some(id), None, || EventPayload::Arrival { queue_lengths });
        log::trace!("t={:.2} {id} arrives", self.clock);

        self.schedule_next_arrival()?;

        match preassigned {
            Some(priority) => self.on_triaged(id, priority, false),
            // Untriaged patients all queue at the lowest level, so triage is FIFO.
            None => self.request(id, ResourceKind::TriageNurse, Priority::LOWEST, Priority::LOWEST),
        }
    }

    fn on_triaged(
        &mut self,
        id: PatientId,
        priority: Priority,
        classified: bool,
    ) -> Result<(), SimError> {
        self.patients.insert(
            id,
            Acuity {
                triage: priority,
                peak: priority,
                classified,
            },
        );
        self.emit(Some(id), None, || EventPayload::Triaged {
            priority,
            classified,
        });

        let record = self
            .patients
            .get::<Presentation>(id)
            .ok_or_else(|| self.violation(id, None, "patient has no presentation"))?
            .record;
        let needs = Needs {
            mri: match record.needs_mri {
                Some(flag) => flag,
                None => self.rng.gen::<f64>() < self.needs.mri.probability_for(priority),
            },
            ultrasound: match record.needs_ultrasound {
                Some(flag) => flag,
                None => self.rng.gen::<f64>() < self.needs.p_ultrasound,
            },
        };

        let decision = self.agent.route(priority, needs, &mut self.rng);
        let tasks = decision.tasks.clone();
        self.emit(Some(id), None, || EventPayload::Routed {
            tasks,
            needs,
            bypass: decision.bypassed,
        });
        let first = decision.tasks.first().copied();
        self.patients.insert(
            id,
            Pathway {
                tasks: decision.tasks,
                needs,
                bypassed: decision.bypassed,
                next: 0,
            },
        );

        match first {
            Some(kind) => self.request(id, kind, priority, priority),
            None => self.complete(id),
        }
    }

    // ── Resource contention ────────────────────────────────────────────

    /// Ask `kind` for a unit. `queue_as` orders the queue; `triage` picks
    /// the service-time multiplier and the level an eviction escalates from.
    fn request(
        &mut self,
        id: PatientId,
        kind: ResourceKind,
        queue_as: Priority,
        triage: Priority,
    ) -> Result<(), SimError> {
        if self.pools[kind.index()].capacity() == 0 {
            return Err(ConfigError::UnstaffedService(kind).into());
        }
        let duration = match self.patients.get::<ServiceOverrides>(id).and_then(|o| o.get(kind)) {
            Some(fixed) => fixed,
            None => self.sampler.sample(kind, triage, &mut self.rng),
        };

        let now = self.clock;
        self.with_journey(id, Some(kind), |j| {
            j.status = PatientStatus::Queued(kind);
            j.records.push(TaskRecord::new(kind, now));
        })?;
        self.emit(Some(id), Some(kind), || EventPayload::Requested {
            priority: queue_as,
            duration,
        });

        match self.pools[kind.index()].request(id, queue_as, triage, now, duration) {
            RequestOutcome::Granted(grant) => self.on_grant(kind, grant),
            RequestOutcome::Preempted { grant, eviction } => {
                self.on_eviction(kind, eviction, id)?;
                self.on_grant(kind, grant)
            }
            RequestOutcome::Queued => Ok(()),
        }
    }

    fn on_grant(&mut self, kind: ResourceKind, grant: Grant) -> Result<(), SimError> {
        let now = self.clock;
        let id = grant.slot.patient;
        self.metrics.record_grant(kind, grant.waited, grant.resumed);

        let requested_at = self.with_journey(id, Some(kind), |j| {
            j.status = PatientStatus::InService(kind);
            j.open_record_mut(kind).map(|r| {
                r.started_at.get_or_insert(now);
                r.waited += grant.waited;
                r.segments += 1;
                r.requested_at
            })
        })?;
        let requested_at =
            requested_at.ok_or_else(|| self.violation(id, Some(kind), "granted without a request"))?;
        let arrived_at = self
            .patients
            .get::<Admission>(id)
            .map(|a| a.arrived_at)
            .ok_or_else(|| self.violation(id, Some(kind), "unknown patient"))?;
        if !(arrived_at <= requested_at && requested_at <= now) {
            return Err(self.violation(id, Some(kind), "request timestamps out of order"));
        }

        self.schedule(
            grant.slot.expected_end,
            Event::ServiceEnd {
                kind,
                grant: grant.slot.grant,
                patient: id,
            },
        );
        let pool = &self.pools[kind.index()];
        let (in_service, queue_len) = (pool.in_service_len() as u32, pool.queue_len() as u32);
        self.emit(Some(id), Some(kind), || EventPayload::Granted {
            priority: grant.slot.priority,
            waited: grant.waited,
            duration: grant.slot.expected_end - grant.slot.started_at,
            resumed: grant.resumed,
            in_service,
            queue_len,
        });
        log::trace!("t={now:.2} {id} starts {kind} after {:.2} min", grant.waited);
        Ok(())
    }

    fn on_eviction(
        &mut self,
        kind: ResourceKind,
        eviction: Eviction,
        by: PatientId,
    ) -> Result<(), SimError> {
        let victim = eviction.patient;
        if !kind.preemptible() {
            return Err(self.violation(victim, Some(kind), "evicted from a non-preemptible pool"));
        }
        self.metrics.record_service(kind, eviction.served);
        self.metrics.record_preemption(kind);

        self.patients
            .update::<Acuity, _>(victim, |a| a.peak = a.peak.min(eviction.requeued_as))
            .ok_or_else(|| self.violation(victim, Some(kind), "patient has no priority"))?;
        self.with_journey(victim, Some(kind), |j| {
            j.status = PatientStatus::Queued(kind);
            j.preemptions += 1;
        })?;

        self.emit(Some(victim), Some(kind), || EventPayload::Preempted {
            by,
            served: eviction.served,
            residual: eviction.residual,
            requeued_as: eviction.requeued_as,
        });
        log::debug!(
            "t={:.2} {by} preempts {victim} on {kind}; {victim} re-queued as {} with {:.1} min left",
            self.clock,
            eviction.requeued_as,
            eviction.residual
        );
        Ok(())
    }

    fn on_service_end(
        &mut self,
        kind: ResourceKind,
        grant: GrantId,
        id: PatientId,
    ) -> Result<(), SimError> {
        let now = self.clock;
        let Some(slot) = self.pools[kind.index()].release(grant) else {
            // Ended early by a preemption.
            return Ok(());
        };
        if slot.patient != id {
            return Err(self.violation(id, Some(kind), "released a unit held by another patient"));
        }

        let served = now - slot.started_at;
        let (in_service, queue_len) = {
            let pool = &self.pools[kind.index()];
            (pool.in_service_len(), pool.queue_len())
        };
        self.metrics.record_service(kind, served);
        self.metrics.record_release(kind, now, queue_len);
        self.emit(Some(id), Some(kind), || EventPayload::Released {
            served,
            in_service: in_service as u32,
            queue_len: queue_len as u32,
        });

        let closed = self.with_journey(id, Some(kind), |j| {
            j.open_record_mut(kind).map(|r| {
                r.ended_at = Some(now);
                r.started_at
            })
        })?;
        match closed {
            Some(Some(started)) if started <= now => {}
            _ => return Err(self.violation(id, Some(kind), "service ended without a start")),
        }

        if !self.closing {
            if let Some(next) = self.pools[kind.index()].grant_next(now) {
                self.on_grant(kind, next)?;
            }
        }

        if kind == ResourceKind::TriageNurse {
            if self.closing {
                return self.stop(id, kind);
            }
            let record = self
                .patients
                .get::<Presentation>(id)
                .ok_or_else(|| self.violation(id, Some(kind), "patient has no presentation"))?
                .record;
            let priority = self.classifier.classify(&record.symptoms).priority;
            return self.on_triaged(id, priority, true);
        }

        let next = self
            .patients
            .update::<Pathway, _>(id, |p| {
                p.next += 1;
                p.current()
            })
            .ok_or_else(|| self.violation(id, Some(kind), "patient has no pathway"))?;
        match next {
            None => self.complete(id),
            Some(_) if self.closing => self.stop(id, kind),
            Some(next_kind) => {
                let triage = self.acuity(id, Some(next_kind))?.triage;
                self.request(id, next_kind, triage, triage)
            }
        }
    }

    fn complete(&mut self, id: PatientId) -> Result<(), SimError> {
        let now = self.clock;
        let total_wait = self.with_journey(id, None, |j| {
            j.status = PatientStatus::Completed;
            j.completed_at = Some(now);
            j.total_wait()
        })?;
        let arrived_at = self
            .patients
            .get::<Admission>(id)
            .map(|a| a.arrived_at)
            .ok_or_else(|| self.violation(id, None, "unknown patient"))?;
        self.emit(Some(id), None, || EventPayload::Completed {
            total_wait,
            total_time: now - arrived_at,
        });
        log::trace!("t={now:.2} {id} leaves after {:.1} min", now - arrived_at);
        Ok(())
    }

    /// Finished a task after the horizon and is not sent on.
    fn stop(&mut self, id: PatientId, kind: ResourceKind) -> Result<(), SimError> {
        self.with_journey(id, Some(kind), |j| j.status = PatientStatus::Stopped(kind))
    }

    fn check_pools(&self) -> Result<(), SimError> {
        for pool in &self.pools {
            if pool.in_service_len() > pool.capacity() as usize {
                return Err(SimError::invariant(
                    self.clock,
                    pool.in_service().last().map(|s| s.patient),
                    Some(pool.kind()),
                    format!(
                        "{} in service exceeds capacity {}",
                        pool.in_service_len(),
                        pool.capacity()
                    ),
                ));
            }
        }
        Ok(())
    }

    // ── Summary ────────────────────────────────────────────────────────

    fn finish(self) -> RunOutcome {
        let horizon = self.config.horizon();
        let ended_at = match self.config.termination {
            Termination::Truncate => horizon,
            Termination::FinishCurrentTask => self.clock.max(horizon),
        };

        let patients: Vec<PatientOutcome> = self
            .patients
            .ids()
            .map(|id| self.outcome_of(id))
            .collect();
        let routed: Vec<RoutedPatient> =
            patients.iter().filter_map(PatientOutcome::routed).collect();
        let routing = self.agent.evaluate(&routed);

        let summary = self.metrics.summarize(
            RunContext {
                policy: self.config.policy,
                seed: self.config.seed,
                horizon,
                ended_at,
                capacities: self.config.capacities,
            },
            &patients,
            routing,
        );

        RunOutcome {
            summary,
            patients,
            trace: self.trace,
        }
    }

    fn outcome_of(&self, id: PatientId) -> PatientOutcome {
        let arrived_at = self.patients.get::<Admission>(id).map_or(0.0, |a| a.arrived_at);
        let acuity = self.patients.get::<Acuity>(id);
        let pathway = self.patients.get::<Pathway>(id);
        let journey = self.patients.get::<Journey>(id).unwrap_or_default();
        PatientOutcome {
            id,
            arrived_at,
            triage: acuity.map(|a| a.triage),
            peak: acuity.map(|a| a.peak),
            classified: acuity.is_some_and(|a| a.classified),
            needs: pathway.as_ref().map(|p| p.needs),
            bypassed: pathway.as_ref().is_some_and(|p| p.bypassed),
            tasks: pathway.map(|p| p.tasks).unwrap_or_default(),
            total_wait: journey.total_wait(),
            preemptions: journey.preemptions,
            status: journey.status,
            completed_at: journey.completed_at,
            records: journey.records,
        }
    }
}

/// Build from `config` and run to completion.
pub fn run_simulation(config: SimulationConfig) -> Result<RunOutcome, SimError> {
    EdSimulation::new(config)?.run()
}
