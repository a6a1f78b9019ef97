//! EDSim Core - Emergency Department Simulation Engine
//!
//! A discrete-event simulation of patients flowing through an emergency
//! department: triage, a doctor, optional imaging and a bed, with doctors and
//! imaging preemptible by more urgent arrivals.
//!
//! # Architecture
//!
//! Patients live in a `hecs` world owned by the engine:
//! - **Entities**: One per arriving patient
//! - **Components**: Pure data (Admission, Acuity, Pathway, Journey, ...)
//! - **Engine**: A single-threaded event loop that advances each patient
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | Routing agent and its bypass self-assessment |
//! | [`analysis`] | KPIs and findings derived from a run summary |
//! | [`components`] | Patient component definitions |
//! | [`engine`] | Event loop, patient state machine, run result |
//! | [`error`] | Simulation and trace error types |
//! | [`experiment`] | Same run under every routing policy |
//! | [`generation`] | Synthetic clinical presentations |
//! | [`metrics`] | Wait, utilization and compliance collection |
//! | [`pool`] | Priority-preemptive resource pools |
//! | [`registry`] | Patient store keyed by [`PatientId`](edsim_logic::resources::PatientId) |
//! | [`sampler`] | Service-time sampling |
//! | [`source`] | Patient arrival sources |
//! | [`trace`] | Event trace and its binary encoding |
//!
//! # Example
//!
//! ```rust,no_run
//! use edsim_core::prelude::*;
//!
//! let config = SimulationConfig {
//!     horizon_minutes: 5000,
//!     policy: PolicyKind::SingleAgent,
//!     ..SimulationConfig::default()
//! };
//! let outcome = run_simulation(config)?;
//! println!("{}", outcome.summary.to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod agent;
pub mod analysis;
pub mod components;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod generation;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod sampler;
pub mod source;
pub mod trace;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{run_simulation, EdSimulation, RunOutcome};
    pub use crate::error::{SimError, TraceError};
    pub use crate::metrics::RunSummary;
    pub use crate::source::{Arrival, PatientSource};
    pub use edsim_logic::config::{SimulationConfig, Termination};
    pub use edsim_logic::priority::Priority;
    pub use edsim_logic::resources::{Capacities, PatientId, ResourceKind};
    pub use edsim_logic::routing::PolicyKind;
}
