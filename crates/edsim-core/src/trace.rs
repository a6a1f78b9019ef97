//! Event trace recording and its binary encoding.
//!
//! The trace is an ordered list of (clock, patient, resource, payload)
//! records, enough to rebuild every summary metric. It encodes with bincode
//! inside a versioned envelope; two runs with the same configuration and
//! seed encode to identical bytes.

use std::io::{Read, Write};

use edsim_logic::priority::Priority;
use edsim_logic::resources::{PatientId, ResourceKind};
use edsim_logic::routing::Needs;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// Version number for the trace envelope (increment when the format changes)
pub const TRACE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Queue lengths of every pool, in `ResourceKind::ALL` order.
    Arrival { queue_lengths: [u32; 6] },
    Triaged { priority: Priority, classified: bool },
    Routed {
        tasks: Vec<ResourceKind>,
        needs: Needs,
        bypass: bool,
    },
    Requested { priority: Priority, duration: f64 },
    Granted {
        priority: Priority,
        waited: f64,
        duration: f64,
        resumed: bool,
        in_service: u32,
        queue_len: u32,
    },
    Preempted {
        by: PatientId,
        served: f64,
        residual: f64,
        requeued_as: Priority,
    },
    Released {
        served: f64,
        in_service: u32,
        queue_len: u32,
    },
    Completed { total_wait: f64, total_time: f64 },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Arrival { .. } => "arrival",
            EventPayload::Triaged { .. } => "triaged",
            EventPayload::Routed { .. } => "routed",
            EventPayload::Requested { .. } => "requested",
            EventPayload::Granted { .. } => "granted",
            EventPayload::Preempted { .. } => "preempted",
            EventPayload::Released { .. } => "released",
            EventPayload::Completed { .. } => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub clock: f64,
    pub patient: Option<PatientId>,
    pub resource: Option<ResourceKind>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTrace {
    pub version: u32,
    pub records: Vec<EventRecord>,
}

impl EventTrace {
    pub fn new() -> Self {
        Self {
            version: TRACE_VERSION,
            records: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        clock: f64,
        patient: Option<PatientId>,
        resource: Option<ResourceKind>,
        payload: EventPayload,
    ) {
        self.records.push(EventRecord {
            clock,
            patient,
            resource,
            payload,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records about one patient, in order.
    pub fn for_patient(&self, patient: PatientId) -> impl Iterator<Item = &EventRecord> + '_ {
        self.records
            .iter()
            .filter(move |r| r.patient == Some(patient))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TraceError> {
        Ok(bincode::serialize(self)?)
    }

    /// Write the trace to a writer
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TraceError> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Read a trace from a reader
    pub fn read_from<R: Read>(reader: R) -> Result<Self, TraceError> {
        let trace: EventTrace = bincode::deserialize_from(reader)?;
        if trace.version != TRACE_VERSION {
            return Err(TraceError::VersionMismatch {
                expected: TRACE_VERSION,
                found: trace.version,
            });
        }
        Ok(trace)
    }
}
