//! Synthetic clinical presentations.
//!
//! Each presentation fixes a set of symptom ranges; a draw picks a
//! presentation by weight and jitters every reading uniformly inside its
//! range. Symptoms a presentation does not list stay missing.

use edsim_logic::symptoms::Symptom::*;
use edsim_logic::symptoms::{Symptom, SymptomVector};
use rand::distributions::WeightedIndex;
use rand::{Rng, RngCore};
use rand_distr::Distribution;

use crate::error::SimError;

/// A named clinical picture with symptom ranges.
#[derive(Debug, Clone, Copy)]
pub struct PresentationProfile {
    pub name: &'static str,
    pub weight: f64,
    pub ranges: &'static [(Symptom, f64, f64)],
}

impl PresentationProfile {
    fn draw(&self, rng: &mut dyn RngCore) -> SymptomVector {
        let mut symptoms = SymptomVector::new();
        for &(symptom, lo, hi) in self.ranges {
            let value = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            symptoms.set(symptom, value);
        }
        symptoms
    }
}

pub static PRESENTATIONS: &[PresentationProfile] = &[
    // Immediate
    PresentationProfile {
        name: "cardiac arrest",
        weight: 0.05,
        ranges: &[
            (Airway, 0.0, 0.0),
            (ConsciousLevel, 0.0, 2.0),
            (Oxygenation, 40.0, 60.0),
            (HeartRate, 140.0, 180.0),
            (BloodPressure, 40.0, 70.0),
        ],
    },
    PresentationProfile {
        name: "major trauma",
        weight: 0.05,
        ranges: &[
            (Haemorrhage, 9.0, 10.0),
            (UncontrollableBleeding, 1.0, 1.0),
            (MechanismOfInjury, 7.0, 10.0),
            (Pain, 7.0, 10.0),
        ],
    },
    PresentationProfile {
        name: "hypoxia",
        weight: 0.05,
        ranges: &[
            (Oxygenation, 50.0, 68.0),
            (ShortnessOfBreath, 1.0, 1.0),
            (Onset, 6.0, 10.0),
        ],
    },
    // Very urgent
    PresentationProfile {
        name: "stroke",
        weight: 0.08,
        ranges: &[
            (NeurologicalDeficit, 1.0, 1.0),
            (NeurologicalOnset, 8.0, 10.0),
            (ConsciousLevel, 12.0, 14.0),
        ],
    },
    PresentationProfile {
        name: "chest pain",
        weight: 0.12,
        ranges: &[(Pain, 8.0, 10.0), (ShortnessOfBreath, 1.0, 1.0), (Onset, 6.0, 8.0)],
    },
    PresentationProfile {
        name: "head injury",
        weight: 0.05,
        ranges: &[
            (ConsciousLevel, 9.0, 12.0),
            (HistoryOfUnconsciousness, 1.0, 1.0),
            (MechanismOfInjury, 3.0, 5.0),
        ],
    },
    // Urgent
    PresentationProfile {
        name: "abdominal pain",
        weight: 0.15,
        ranges: &[(Pain, 5.5, 6.5), (OnsetOfSymptoms, 3.0, 5.0)],
    },
    PresentationProfile {
        name: "prior collapse",
        weight: 0.05,
        ranges: &[(HistoryOfUnconsciousness, 1.0, 1.0), (Pain, 0.0, 2.0)],
    },
    PresentationProfile {
        name: "recent neurological deficit",
        weight: 0.05,
        ranges: &[(NeurologicalDeficit, 1.0, 1.0), (NeurologicalOnset, 3.5, 4.5)],
    },
    // Standard
    PresentationProfile {
        name: "fracture",
        weight: 0.08,
        ranges: &[
            (Pain, 3.0, 4.5),
            (Deformity, 5.0, 8.0),
            (Swelling, 1.0, 1.0),
            (MechanismOfInjury, 0.0, 3.0),
        ],
    },
    PresentationProfile {
        name: "headache",
        weight: 0.06,
        ranges: &[(Pain, 2.5, 4.0), (OnsetOfSymptoms, 2.0, 3.5)],
    },
    PresentationProfile {
        name: "fever",
        weight: 0.06,
        ranges: &[(SkinTemperature, 7.5, 9.5), (OnsetOfSymptoms, 3.0, 5.0)],
    },
    // Non-urgent
    PresentationProfile {
        name: "minor complaint",
        weight: 0.08,
        ranges: &[(Pain, 0.0, 1.9), (OnsetOfSymptoms, 0.0, 1.9)],
    },
    PresentationProfile {
        name: "allergy",
        weight: 0.07,
        ranges: &[(SkinTemperature, 4.0, 6.0)],
    },
];

/// Weighted draw over [`PRESENTATIONS`].
#[derive(Debug, Clone)]
pub struct PresentationSampler {
    index: WeightedIndex<f64>,
}

impl PresentationSampler {
    pub fn new() -> Result<Self, SimError> {
        let index = WeightedIndex::new(PRESENTATIONS.iter().map(|p| p.weight))
            .map_err(|e| SimError::Distribution(format!("presentation weights: {e}")))?;
        Ok(Self { index })
    }

    /// Pick a presentation and draw its symptoms.
    pub fn sample(&self, rng: &mut dyn RngCore) -> (&'static str, SymptomVector) {
        let profile = &PRESENTATIONS[self.index.sample(rng)];
        (profile.name, profile.draw(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edsim_logic::fuzzy::FuzzyRegistry;
    use edsim_logic::mts::MtsClassifier;
    use edsim_logic::priority::{Priority, PriorityWeights};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = PRESENTATIONS.iter().map(|p| p.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_draws_stay_in_universe() {
        let registry = FuzzyRegistry::manchester().unwrap();
        let sampler = PresentationSampler::new().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let (_, symptoms) = sampler.sample(&mut rng);
            assert!(symptoms.out_of_universe(&registry).is_empty());
        }
    }

    #[test]
    fn test_every_band_is_reachable() {
        let classifier = MtsClassifier::manchester(PriorityWeights::default()).unwrap();
        let sampler = PresentationSampler::new().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [0usize; 5];
        for _ in 0..2000 {
            let (_, symptoms) = sampler.sample(&mut rng);
            seen[classifier.classify(&symptoms).priority.ordinal() as usize] += 1;
        }
        for p in Priority::ALL {
            assert!(seen[p.ordinal() as usize] > 0, "{p} never produced");
        }
    }
}
