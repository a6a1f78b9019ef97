//! Trapezoidal fuzzy membership library.
//!
//! A [`FuzzyRegistry`] maps (variable, term) pairs to [`Trapezoid`] shapes.
//! It is built once per run and then only read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Added to slope denominators so step edges never divide by zero.
pub const MEMBERSHIP_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FuzzyError {
    #[error("invalid trapezoid for {variable}/{term}: ({a}, {b}, {c}, {d}) must satisfy a <= b <= c <= d")]
    InvalidShape {
        variable: String,
        term: String,
        a: f64,
        b: f64,
        c: f64,
        d: f64,
    },
    #[error("unknown fuzzy symbol {variable}/{term}")]
    UnknownSymbol { variable: String, term: String },
}

/// Trapezoid (a, b, c, d) with a <= b <= c <= d.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trapezoid {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl Trapezoid {
    /// Returns `None` unless all four corners are finite and ordered.
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Option<Self> {
        let finite = [a, b, c, d].iter().all(|v| v.is_finite());
        if finite && a <= b && b <= c && c <= d {
            Some(Self { a, b, c, d })
        } else {
            None
        }
    }

    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.a, self.b, self.c, self.d)
    }

    /// Degree of membership of `x`, in [0, 1].
    ///
    /// The plateau [b, c] is inclusive at both ends, so a fully degenerate
    /// shape a = b = c = d is 1 exactly at `a`. Non-finite input is 0.
    pub fn membership(&self, x: f64) -> f64 {
        if !x.is_finite() || x < self.a || x > self.d {
            return 0.0;
        }
        let mu = if x >= self.b && x <= self.c {
            1.0
        } else if x < self.b {
            (x - self.a) / (self.b - self.a + MEMBERSHIP_EPSILON)
        } else {
            (self.d - x) / (self.d - self.c + MEMBERSHIP_EPSILON)
        };
        mu.clamp(0.0, 1.0)
    }
}

/// Named fuzzy variables and their linguistic terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzyRegistry {
    variables: BTreeMap<String, BTreeMap<String, Trapezoid>>,
}

impl FuzzyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a term. Fails with `InvalidShape` when the
    /// corners are out of order or not finite.
    pub fn register(
        &mut self,
        variable: &str,
        term: &str,
        (a, b, c, d): (f64, f64, f64, f64),
    ) -> Result<(), FuzzyError> {
        let shape = Trapezoid::new(a, b, c, d).ok_or_else(|| FuzzyError::InvalidShape {
            variable: variable.to_string(),
            term: term.to_string(),
            a,
            b,
            c,
            d,
        })?;
        self.variables
            .entry(variable.to_string())
            .or_default()
            .insert(term.to_string(), shape);
        Ok(())
    }

    pub fn trapezoid(&self, variable: &str, term: &str) -> Result<Trapezoid, FuzzyError> {
        self.variables
            .get(variable)
            .and_then(|terms| terms.get(term))
            .copied()
            .ok_or_else(|| FuzzyError::UnknownSymbol {
                variable: variable.to_string(),
                term: term.to_string(),
            })
    }

    pub fn membership(&self, variable: &str, term: &str, x: f64) -> Result<f64, FuzzyError> {
        Ok(self.trapezoid(variable, term)?.membership(x))
    }

    pub fn contains(&self, variable: &str, term: &str) -> bool {
        self.trapezoid(variable, term).is_ok()
    }

    /// Universe of discourse: the span from the lowest `a` to the highest `d`
    /// over all of the variable's terms.
    pub fn universe(&self, variable: &str) -> Option<(f64, f64)> {
        let terms = self.variables.get(variable)?;
        terms.values().fold(None, |acc, t| match acc {
            None => Some((t.a, t.d)),
            Some((lo, hi)) => Some((lo.min(t.a), hi.max(t.d))),
        })
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn terms(&self, variable: &str) -> impl Iterator<Item = &str> {
        self.variables
            .get(variable)
            .into_iter()
            .flat_map(|terms| terms.keys().map(String::as_str))
    }

    /// The Manchester chart vocabulary used by the default rule set.
    pub fn manchester() -> Result<Self, FuzzyError> {
        let mut registry = Self::new();
        for &(variable, term, corners) in MANCHESTER_TERMS {
            registry.register(variable, term, corners)?;
        }
        Ok(registry)
    }
}

#[rustfmt::skip]
const MANCHESTER_TERMS: &[(&str, &str, (f64, f64, f64, f64))] = &[
    ("oxygenation", "inadequate", (0.0, 0.0, 70.0, 80.0)),
    ("oxygenation", "adequate but very low", (70.0, 80.0, 85.0, 90.0)),
    ("oxygenation", "adequate but low", (85.0, 90.0, 95.0, 100.0)),
    ("oxygenation", "adequate", (95.0, 100.0, 100.0, 100.0)),
    ("sweating", "little to none", (0.0, 0.0, 2.0, 4.0)),
    ("sweating", "some", (2.0, 4.0, 5.0, 7.0)),
    ("sweating", "significant", (5.0, 7.0, 8.0, 9.0)),
    ("sweating", "exceptional", (8.0, 9.0, 10.0, 10.0)),
    ("colour", "pale", (0.0, 0.0, 3.0, 5.0)),
    ("colour", "somewhat lacking", (3.0, 5.0, 7.0, 9.0)),
    ("colour", "full", (7.0, 9.0, 10.0, 10.0)),
    ("heart rate", "light", (0.0, 30.0, 50.0, 70.0)),
    ("heart rate", "moderate", (50.0, 70.0, 90.0, 110.0)),
    ("heart rate", "vigorous", (90.0, 110.0, 130.0, 150.0)),
    ("heart rate", "very vigorous", (130.0, 150.0, 200.0, 200.0)),
    ("blood pressure", "low", (0.0, 0.0, 80.0, 100.0)),
    ("blood pressure", "normal", (80.0, 100.0, 120.0, 140.0)),
    ("blood pressure", "high", (120.0, 140.0, 200.0, 200.0)),
    ("conscious level", "unresponsive", (0.0, 0.0, 3.0, 5.0)),
    ("conscious level", "reduced", (3.0, 5.0, 7.0, 9.0)),
    ("conscious level", "slightly reduced", (7.0, 9.0, 12.0, 14.0)),
    ("conscious level", "normal", (12.0, 14.0, 15.0, 15.0)),
    ("pain", "little to none", (0.0, 0.0, 2.0, 4.0)),
    ("pain", "mild", (2.0, 4.0, 4.0, 6.0)),
    ("pain", "moderate", (4.0, 6.0, 6.0, 8.0)),
    ("pain", "severe", (6.0, 8.0, 10.0, 10.0)),
    ("onset", "distant", (0.0, 0.0, 2.0, 4.0)),
    ("onset", "recent", (2.0, 4.0, 4.0, 6.0)),
    ("onset", "acute", (4.0, 6.0, 6.0, 8.0)),
    ("onset", "rapid", (6.0, 8.0, 8.0, 10.0)),
    ("onset", "abrupt", (8.0, 10.0, 10.0, 10.0)),
    ("neurological onset", "distant", (0.0, 0.0, 2.0, 4.0)),
    ("neurological onset", "recent", (2.0, 4.0, 4.0, 6.0)),
    ("neurological onset", "acute", (4.0, 6.0, 6.0, 8.0)),
    ("neurological onset", "rapid", (6.0, 8.0, 8.0, 10.0)),
    ("neurological onset", "abrupt", (8.0, 10.0, 10.0, 10.0)),
    ("onset of symptoms", "distant", (0.0, 0.0, 2.0, 4.0)),
    ("onset of symptoms", "recent", (2.0, 4.0, 4.0, 6.0)),
    ("onset of symptoms", "acute", (4.0, 6.0, 6.0, 8.0)),
    ("onset of symptoms", "rapid", (6.0, 8.0, 8.0, 10.0)),
    ("onset of symptoms", "abrupt", (8.0, 10.0, 10.0, 10.0)),
    ("haemorrhage", "minor", (0.0, 0.0, 3.0, 5.0)),
    ("haemorrhage", "major", (3.0, 5.0, 7.0, 9.0)),
    ("haemorrhage", "exsanguinating", (7.0, 9.0, 10.0, 10.0)),
    ("deformity", "little to none", (0.0, 0.0, 3.0, 5.0)),
    ("deformity", "moderate", (3.0, 5.0, 5.0, 7.0)),
    ("deformity", "significant", (5.0, 7.0, 10.0, 10.0)),
    ("mechanism of injury", "minor", (0.0, 0.0, 3.0, 5.0)),
    ("mechanism of injury", "moderate", (3.0, 5.0, 5.0, 7.0)),
    ("mechanism of injury", "significant", (5.0, 7.0, 10.0, 10.0)),
    ("skin temperature", "cold", (0.0, 0.0, 2.0, 4.0)),
    ("skin temperature", "normal", (2.0, 4.0, 5.0, 6.0)),
    ("skin temperature", "warm", (5.0, 6.0, 7.0, 8.0)),
    ("skin temperature", "hot", (7.0, 8.0, 9.0, 10.0)),
    ("skin temperature", "very hot", (9.0, 10.0, 10.0, 10.0)),
];
