//! Patient sources.
//!
//! A source yields arrivals at absolute, non-decreasing times. Sources only
//! describe who walks in; priorities and need flags are resolved by the
//! engine unless the record already carries them.

use std::collections::VecDeque;

use edsim_logic::config::{ConfigError, PatientRecord};
use edsim_logic::fuzzy::FuzzyRegistry;
use edsim_logic::priority::Priority;
use edsim_logic::resources::{Capacities, ResourceKind};
use rand::RngCore;
use rand_distr::{Distribution, Exp};

use crate::components::ServiceOverrides;
use crate::error::SimError;
use crate::generation::PresentationSampler;

/// One patient walking through the door.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub at: f64,
    pub record: PatientRecord,
    pub service_minutes: ServiceOverrides,
}

impl Arrival {
    pub fn new(at: f64, record: PatientRecord) -> Self {
        Self {
            at,
            record,
            service_minutes: ServiceOverrides::default(),
        }
    }

    /// A patient who arrives already labelled and needs no imaging.
    pub fn triaged(at: f64, priority: Priority) -> Self {
        Self::new(
            at,
            PatientRecord {
                priority: Some(priority),
                needs_mri: Some(false),
                needs_ultrasound: Some(false),
                ..PatientRecord::default()
            },
        )
    }

    pub fn with_needs(mut self, mri: bool, ultrasound: bool) -> Self {
        self.record.needs_mri = Some(mri);
        self.record.needs_ultrasound = Some(ultrasound);
        self
    }

    /// Fix the service time at `kind` instead of sampling it.
    pub fn with_service(mut self, kind: ResourceKind, minutes: f64) -> Self {
        self.service_minutes = self.service_minutes.with(kind, minutes);
        self
    }
}

pub trait PatientSource {
    /// The next arrival, or `None` once the source is exhausted.
    fn next_arrival(&mut self, rng: &mut dyn RngCore) -> Option<Arrival>;
}

/// Poisson arrivals: exponential gaps with the configured hourly rate.
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    gaps: Exp<f64>,
    clock: f64,
}

impl ArrivalProcess {
    pub fn new(rate_per_hour: f64) -> Result<Self, SimError> {
        if !(rate_per_hour.is_finite() && rate_per_hour > 0.0) {
            return Err(ConfigError::InvalidArrivalRate(rate_per_hour).into());
        }
        let gaps = Exp::new(rate_per_hour / 60.0)
            .map_err(|e| SimError::Distribution(format!("inter-arrival: {e}")))?;
        Ok(Self { gaps, clock: 0.0 })
    }

    fn next_time(&mut self, rng: &mut dyn RngCore) -> f64 {
        self.clock += self.gaps.sample(rng);
        self.clock
    }
}

/// Patients with synthetic presentations.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    arrivals: ArrivalProcess,
    presentations: PresentationSampler,
}

impl SyntheticSource {
    pub fn new(rate_per_hour: f64) -> Result<Self, SimError> {
        Ok(Self {
            arrivals: ArrivalProcess::new(rate_per_hour)?,
            presentations: PresentationSampler::new()?,
        })
    }
}

impl PatientSource for SyntheticSource {
    fn next_arrival(&mut self, rng: &mut dyn RngCore) -> Option<Arrival> {
        let at = self.arrivals.next_time(rng);
        let (name, symptoms) = self.presentations.sample(rng);
        log::trace!("synthetic arrival at {at:.2}: {name}");
        Some(Arrival::new(
            at,
            PatientRecord {
                symptoms,
                ..PatientRecord::default()
            },
        ))
    }
}

/// Externally supplied records, cycled in order.
#[derive(Debug, Clone)]
pub struct ExternalSource {
    arrivals: ArrivalProcess,
    records: Vec<PatientRecord>,
    cursor: usize,
}

impl ExternalSource {
    /// Keep the records the simulator can serve. Readings outside their
    /// universe, or flags for a service with no staff, reject the record.
    pub fn new(
        records: Vec<PatientRecord>,
        rate_per_hour: f64,
        registry: &FuzzyRegistry,
        capacities: &Capacities,
    ) -> Result<Self, SimError> {
        let total = records.len();
        let accepted: Vec<PatientRecord> = records
            .into_iter()
            .enumerate()
            .filter(|(i, record)| match reject_reason(record, registry, capacities) {
                Some(reason) => {
                    log::warn!("rejecting patient record {i}: {reason}");
                    false
                }
                None => true,
            })
            .map(|(_, record)| record)
            .collect();

        if accepted.is_empty() {
            return Err(ConfigError::EmptyRecordStream.into());
        }
        log::debug!("external source accepted {} of {} records", accepted.len(), total);

        Ok(Self {
            arrivals: ArrivalProcess::new(rate_per_hour)?,
            records: accepted,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn reject_reason(
    record: &PatientRecord,
    registry: &FuzzyRegistry,
    capacities: &Capacities,
) -> Option<String> {
    if let Some((symptom, value)) = record.symptoms.out_of_universe(registry).first() {
        return Some(format!("{} = {value} is outside its range", symptom.name()));
    }
    let flagged = [
        (ResourceKind::Mri, record.needs_mri),
        (ResourceKind::Ultrasound, record.needs_ultrasound),
    ];
    flagged
        .iter()
        .find(|(kind, flag)| *flag == Some(true) && capacities.get(*kind) == 0)
        .map(|(kind, _)| format!("needs {kind} but none is staffed"))
}

impl PatientSource for ExternalSource {
    fn next_arrival(&mut self, rng: &mut dyn RngCore) -> Option<Arrival> {
        let at = self.arrivals.next_time(rng);
        let record = self.records[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.records.len();
        Some(Arrival::new(at, record))
    }
}

/// Fixed arrivals at fixed times. Draws nothing from the rng.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    queue: VecDeque<Arrival>,
}

impl ScriptedSource {
    pub fn new(mut arrivals: Vec<Arrival>) -> Self {
        arrivals.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            queue: arrivals.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl PatientSource for ScriptedSource {
    fn next_arrival(&mut self, _rng: &mut dyn RngCore) -> Option<Arrival> {
        self.queue.pop_front()
    }
}
