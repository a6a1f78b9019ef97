//! Generation - synthetic patient presentations.

mod presentations;

pub use presentations::*;
