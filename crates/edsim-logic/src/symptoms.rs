//! Closed symptom vocabulary and the per-patient symptom vector.
//!
//! Fuzzy symptoms are graded on a numeric scale and looked up in the
//! [`FuzzyRegistry`](crate::fuzzy::FuzzyRegistry) under [`Symptom::name`].
//! Indicator symptoms are crisp truth values in [0, 1] used directly.

use crate::fuzzy::FuzzyRegistry;
use serde::{Deserialize, Serialize};

/// How a symptom's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymptomKind {
    /// Graded measurement evaluated through membership functions.
    Fuzzy,
    /// Truth value in [0, 1].
    Indicator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    /// 1 = airway maintained.
    Airway,
    Oxygenation,
    Sweating,
    Colour,
    HeartRate,
    BloodPressure,
    /// Glasgow-style scale, 15 = fully alert.
    ConsciousLevel,
    Haemorrhage,
    UncontrollableBleeding,
    Pain,
    MechanismOfInjury,
    ShortnessOfBreath,
    /// Onset of breathing complaints.
    Onset,
    NeurologicalDeficit,
    NeurologicalOnset,
    UntruthfulStory,
    HistoryOfUnconsciousness,
    Swelling,
    Deformity,
    OnsetOfSymptoms,
    SkinTemperature,
}

impl Symptom {
    pub const ALL: [Symptom; 21] = [
        Symptom::Airway,
        Symptom::Oxygenation,
        Symptom::Sweating,
        Symptom::Colour,
        Symptom::HeartRate,
        Symptom::BloodPressure,
        Symptom::ConsciousLevel,
        Symptom::Haemorrhage,
        Symptom::UncontrollableBleeding,
        Symptom::Pain,
        Symptom::MechanismOfInjury,
        Symptom::ShortnessOfBreath,
        Symptom::Onset,
        Symptom::NeurologicalDeficit,
        Symptom::NeurologicalOnset,
        Symptom::UntruthfulStory,
        Symptom::HistoryOfUnconsciousness,
        Symptom::Swelling,
        Symptom::Deformity,
        Symptom::OnsetOfSymptoms,
        Symptom::SkinTemperature,
    ];

    /// Registry variable name.
    pub fn name(self) -> &'static str {
        match self {
            Symptom::Airway => "airway",
            Symptom::Oxygenation => "oxygenation",
            Symptom::Sweating => "sweating",
            Symptom::Colour => "colour",
            Symptom::HeartRate => "heart rate",
            Symptom::BloodPressure => "blood pressure",
            Symptom::ConsciousLevel => "conscious level",
            Symptom::Haemorrhage => "haemorrhage",
            Symptom::UncontrollableBleeding => "uncontrollable bleeding",
            Symptom::Pain => "pain",
            Symptom::MechanismOfInjury => "mechanism of injury",
            Symptom::ShortnessOfBreath => "shortness of breath",
            Symptom::Onset => "onset",
            Symptom::NeurologicalDeficit => "neurological deficit",
            Symptom::NeurologicalOnset => "neurological onset",
            Symptom::UntruthfulStory => "untruthful story",
            Symptom::HistoryOfUnconsciousness => "history of unconsciousness",
            Symptom::Swelling => "swelling",
            Symptom::Deformity => "deformity",
            Symptom::OnsetOfSymptoms => "onset of symptoms",
            Symptom::SkinTemperature => "skin temperature",
        }
    }

    pub fn kind(self) -> SymptomKind {
        match self {
            Symptom::Airway
            | Symptom::UncontrollableBleeding
            | Symptom::ShortnessOfBreath
            | Symptom::NeurologicalDeficit
            | Symptom::UntruthfulStory
            | Symptom::HistoryOfUnconsciousness
            | Symptom::Swelling => SymptomKind::Indicator,
            _ => SymptomKind::Fuzzy,
        }
    }

    /// Declared value range. Fuzzy symptoms take theirs from the registry.
    pub fn universe(self, registry: &FuzzyRegistry) -> Option<(f64, f64)> {
        match self.kind() {
            SymptomKind::Indicator => Some((0.0, 1.0)),
            SymptomKind::Fuzzy => registry.universe(self.name()),
        }
    }
}

/// One optional reading per symptom. Missing readings are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymptomVector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airway: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxygenation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conscious_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub haemorrhage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncontrollable_bleeding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism_of_injury: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortness_of_breath: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neurological_deficit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neurological_onset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untruthful_story: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_of_unconsciousness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swelling: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deformity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset_of_symptoms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin_temperature: Option<f64>,
}

impl SymptomVector {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, symptom: Symptom) -> &Option<f64> {
        match symptom {
            Symptom::Airway => &self.airway,
            Symptom::Oxygenation => &self.oxygenation,
            Symptom::Sweating => &self.sweating,
            Symptom::Colour => &self.colour,
            Symptom::HeartRate => &self.heart_rate,
            Symptom::BloodPressure => &self.blood_pressure,
            Symptom::ConsciousLevel => &self.conscious_level,
            Symptom::Haemorrhage => &self.haemorrhage,
            Symptom::UncontrollableBleeding => &self.uncontrollable_bleeding,
            Symptom::Pain => &self.pain,
            Symptom::MechanismOfInjury => &self.mechanism_of_injury,
            Symptom::ShortnessOfBreath => &self.shortness_of_breath,
            Symptom::Onset => &self.onset,
            Symptom::NeurologicalDeficit => &self.neurological_deficit,
            Symptom::NeurologicalOnset => &self.neurological_onset,
            Symptom::UntruthfulStory => &self.untruthful_story,
            Symptom::HistoryOfUnconsciousness => &self.history_of_unconsciousness,
            Symptom::Swelling => &self.swelling,
            Symptom::Deformity => &self.deformity,
            Symptom::OnsetOfSymptoms => &self.onset_of_symptoms,
            Symptom::SkinTemperature => &self.skin_temperature,
        }
    }

    fn slot_mut(&mut self, symptom: Symptom) -> &mut Option<f64> {
        match symptom {
            Symptom::Airway => &mut self.airway,
            Symptom::Oxygenation => &mut self.oxygenation,
            Symptom::Sweating => &mut self.sweating,
            Symptom::Colour => &mut self.colour,
            Symptom::HeartRate => &mut self.heart_rate,
            Symptom::BloodPressure => &mut self.blood_pressure,
            Symptom::ConsciousLevel => &mut self.conscious_level,
            Symptom::Haemorrhage => &mut self.haemorrhage,
            Symptom::UncontrollableBleeding => &mut self.uncontrollable_bleeding,
            Symptom::Pain => &mut self.pain,
            Symptom::MechanismOfInjury => &mut self.mechanism_of_injury,
            Symptom::ShortnessOfBreath => &mut self.shortness_of_breath,
            Symptom::Onset => &mut self.onset,
            Symptom::NeurologicalDeficit => &mut self.neurological_deficit,
            Symptom::NeurologicalOnset => &mut self.neurological_onset,
            Symptom::UntruthfulStory => &mut self.untruthful_story,
            Symptom::HistoryOfUnconsciousness => &mut self.history_of_unconsciousness,
            Symptom::Swelling => &mut self.swelling,
            Symptom::Deformity => &mut self.deformity,
            Symptom::OnsetOfSymptoms => &mut self.onset_of_symptoms,
            Symptom::SkinTemperature => &mut self.skin_temperature,
        }
    }

    pub fn get(&self, symptom: Symptom) -> Option<f64> {
        *self.slot(symptom)
    }

    pub fn set(&mut self, symptom: Symptom, value: f64) {
        *self.slot_mut(symptom) = Some(value);
    }

    pub fn clear(&mut self, symptom: Symptom) {
        *self.slot_mut(symptom) = None;
    }

    /// Builder-style `set`.
    pub fn with(mut self, symptom: Symptom, value: f64) -> Self {
        self.set(symptom, value);
        self
    }

    /// Present readings in declaration order.
    pub fn readings(&self) -> impl Iterator<Item = (Symptom, f64)> + '_ {
        Symptom::ALL
            .iter()
            .filter_map(move |&s| self.get(s).map(|v| (s, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.readings().next().is_none()
    }

    /// Readings that are non-finite or fall outside their universe.
    pub fn out_of_universe(&self, registry: &FuzzyRegistry) -> Vec<(Symptom, f64)> {
        self.readings()
            .filter(|&(symptom, value)| match symptom.universe(registry) {
                Some((lo, hi)) => !value.is_finite() || value < lo || value > hi,
                None => true,
            })
            .collect()
    }
}
