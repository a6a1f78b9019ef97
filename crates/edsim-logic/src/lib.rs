//! Pure emergency-department logic.
//!
//! This crate contains everything about the ED that does not need a clock or
//! a random source: the fuzzy triage classifier, routing plans, service-time
//! parameters and run configuration. Functions take plain data and return
//! results, so the engine crate and the harness share one definition.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Run configuration, patient records, validation |
//! | [`fuzzy`] | Trapezoidal membership functions and the term registry |
//! | [`mts`] | Manchester Triage rule engine and priority selection |
//! | [`priority`] | Five triage levels, wait targets, aggregation weights |
//! | [`resources`] | Resource kinds, capacities, patient ids |
//! | [`routing`] | Routing policies and pathway plans |
//! | [`service_times`] | Per-resource service-time parameters and multipliers |
//! | [`stats`] | Wait statistics and series means |
//! | [`symptoms`] | Closed symptom vocabulary and symptom vectors |

pub mod config;
pub mod fuzzy;
pub mod mts;
pub mod priority;
pub mod resources;
pub mod routing;
pub mod service_times;
pub mod stats;
pub mod symptoms;
