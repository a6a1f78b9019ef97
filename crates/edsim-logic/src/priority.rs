//! Manchester triage priority levels.
//!
//! Five ranked levels, lower ordinal = more urgent. Each level carries a
//! maximum-wait target and a default aggregation weight.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Triage priority, ordered from most to least urgent.
///
/// The derived `Ord` follows declaration order, so `Immediate < NonUrgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Red: seen immediately.
    Immediate,
    /// Orange: within 10 minutes.
    VeryUrgent,
    /// Yellow: within 60 minutes.
    Urgent,
    /// Green: within 120 minutes.
    Standard,
    /// Blue: within 240 minutes.
    NonUrgent,
}

impl Priority {
    /// All levels, most urgent first.
    pub const ALL: [Priority; 5] = [
        Priority::Immediate,
        Priority::VeryUrgent,
        Priority::Urgent,
        Priority::Standard,
        Priority::NonUrgent,
    ];

    /// The least urgent level. Its fuzzy degree is always zero.
    pub const LOWEST: Priority = Priority::NonUrgent;

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// Maximum wait target in minutes.
    pub fn max_wait_minutes(self) -> f64 {
        match self {
            Priority::Immediate => 0.0,
            Priority::VeryUrgent => 10.0,
            Priority::Urgent => 60.0,
            Priority::Standard => 120.0,
            Priority::NonUrgent => 240.0,
        }
    }

    /// One step more urgent, saturating at `Immediate`.
    pub fn escalate(self) -> Self {
        match self {
            Priority::Immediate | Priority::VeryUrgent => Priority::Immediate,
            Priority::Urgent => Priority::VeryUrgent,
            Priority::Standard => Priority::Urgent,
            Priority::NonUrgent => Priority::Standard,
        }
    }

    /// Whether `self` is strictly more urgent than `other`.
    pub fn outranks(self, other: Priority) -> bool {
        self < other
    }

    /// Manchester chart colour.
    pub fn colour(self) -> &'static str {
        match self {
            Priority::Immediate => "red",
            Priority::VeryUrgent => "orange",
            Priority::Urgent => "yellow",
            Priority::Standard => "green",
            Priority::NonUrgent => "blue",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Immediate => "IMMEDIATE",
            Priority::VeryUrgent => "VERY_URGENT",
            Priority::Urgent => "URGENT",
            Priority::Standard => "STANDARD",
            Priority::NonUrgent => "NON_URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-level weights used when aggregating rule firings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub immediate: f64,
    pub very_urgent: f64,
    pub urgent: f64,
    pub standard: f64,
    pub non_urgent: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            immediate: 1.0,
            very_urgent: 0.8,
            urgent: 0.6,
            standard: 0.4,
            non_urgent: 0.0,
        }
    }
}

impl PriorityWeights {
    pub fn get(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Immediate => self.immediate,
            Priority::VeryUrgent => self.very_urgent,
            Priority::Urgent => self.urgent,
            Priority::Standard => self.standard,
            Priority::NonUrgent => self.non_urgent,
        }
    }

    /// Levels whose weight lies outside (0, 1]. The lowest level is exempt.
    pub fn out_of_range(&self) -> Vec<(Priority, f64)> {
        Priority::ALL
            .iter()
            .filter(|&&p| p != Priority::LOWEST)
            .map(|&p| (p, self.get(p)))
            .filter(|&(_, w)| !(w > 0.0 && w <= 1.0))
            .collect()
    }
}
