//! Component definitions for the patient store.
//!
//! Components are pure data structs attached to patient entities.
//! They have no behavior - that lives in the engine.

mod patient;

pub use patient::*;
