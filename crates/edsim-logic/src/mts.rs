//! Fuzzy Manchester Triage classifier.
//!
//! Rules are checked against the registry once, at construction. After that
//! classification cannot fail: a rule that references a symptom missing from
//! the input simply fires at 0.

use crate::fuzzy::{FuzzyError, FuzzyRegistry, Trapezoid};
use crate::priority::{Priority, PriorityWeights};
use crate::symptoms::{Symptom, SymptomVector};
use serde::{Deserialize, Serialize};

/// Rule antecedent: a min/max tree over symptom readings.
#[derive(Debug, Clone, PartialEq)]
pub enum Antecedent {
    /// Membership of the reading in a linguistic term.
    Is { symptom: Symptom, term: String },
    /// Indicator reading used as its own truth value.
    Present(Symptom),
    /// Complement of an indicator reading.
    Absent(Symptom),
    /// AND (min).
    All(Vec<Antecedent>),
    /// OR (max).
    Any(Vec<Antecedent>),
}

impl Antecedent {
    pub fn is(symptom: Symptom, term: &str) -> Self {
        Antecedent::Is {
            symptom,
            term: term.to_string(),
        }
    }

    /// `symptom IS term1 OR term2 OR ...`
    pub fn is_any(symptom: Symptom, terms: &[&str]) -> Self {
        Antecedent::Any(terms.iter().map(|t| Self::is(symptom, t)).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyRule {
    pub name: String,
    pub antecedent: Antecedent,
    pub consequent: Priority,
}

impl FuzzyRule {
    pub fn new(name: &str, antecedent: Antecedent, consequent: Priority) -> Self {
        Self {
            name: name.to_string(),
            antecedent,
            consequent,
        }
    }
}

/// Antecedent with its trapezoids resolved.
#[derive(Debug, Clone)]
enum Condition {
    Is(Symptom, Trapezoid),
    Present(Symptom),
    Absent(Symptom),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    fn compile(antecedent: &Antecedent, registry: &FuzzyRegistry) -> Result<Self, FuzzyError> {
        Ok(match antecedent {
            Antecedent::Is { symptom, term } => {
                Condition::Is(*symptom, registry.trapezoid(symptom.name(), term)?)
            }
            Antecedent::Present(s) => Condition::Present(*s),
            Antecedent::Absent(s) => Condition::Absent(*s),
            Antecedent::All(parts) => Condition::All(
                parts
                    .iter()
                    .map(|p| Self::compile(p, registry))
                    .collect::<Result<_, _>>()?,
            ),
            Antecedent::Any(parts) => Condition::Any(
                parts
                    .iter()
                    .map(|p| Self::compile(p, registry))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// `None` when a referenced reading is missing.
    fn evaluate(&self, symptoms: &SymptomVector) -> Option<f64> {
        match self {
            Condition::Is(s, shape) => symptoms.get(*s).map(|x| shape.membership(x)),
            Condition::Present(s) => symptoms.get(*s).map(truth),
            Condition::Absent(s) => symptoms.get(*s).map(|x| 1.0 - truth(x)),
            Condition::All(parts) => parts
                .iter()
                .map(|p| p.evaluate(symptoms))
                .try_fold(1.0_f64, |acc, v| v.map(|v| acc.min(v))),
            Condition::Any(parts) => parts
                .iter()
                .map(|p| p.evaluate(symptoms))
                .try_fold(0.0_f64, |acc, v| v.map(|v| acc.max(v))),
        }
    }
}

fn truth(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    condition: Condition,
    consequent: Priority,
}

/// Firing strength of one rule for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFiring {
    pub rule: String,
    pub consequent: Priority,
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub priority: Priority,
    pub max_wait_minutes: f64,
    /// Aggregated degree per level, indexed by ordinal.
    pub degrees: [f64; 5],
}

#[derive(Debug, Clone)]
pub struct MtsClassifier {
    rules: Vec<CompiledRule>,
    weights: PriorityWeights,
}

impl MtsClassifier {
    /// Fails with `UnknownSymbol` if any rule names a term the registry lacks.
    pub fn new(
        registry: &FuzzyRegistry,
        rules: &[FuzzyRule],
        weights: PriorityWeights,
    ) -> Result<Self, FuzzyError> {
        let rules = rules
            .iter()
            .map(|r| {
                Ok(CompiledRule {
                    name: r.name.clone(),
                    condition: Condition::compile(&r.antecedent, registry)?,
                    consequent: r.consequent,
                })
            })
            .collect::<Result<Vec<_>, FuzzyError>>()?;
        Ok(Self { rules, weights })
    }

    /// Default vocabulary and rule set.
    pub fn manchester(weights: PriorityWeights) -> Result<Self, FuzzyError> {
        Self::new(&FuzzyRegistry::manchester()?, &default_rules(), weights)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn firings(&self, symptoms: &SymptomVector) -> Vec<RuleFiring> {
        self.rules
            .iter()
            .map(|r| RuleFiring {
                rule: r.name.clone(),
                consequent: r.consequent,
                strength: r.condition.evaluate(symptoms).unwrap_or(0.0),
            })
            .collect()
    }

    pub fn classify(&self, symptoms: &SymptomVector) -> TriageOutcome {
        let mut strongest = [0.0_f64; 5];
        for rule in &self.rules {
            let strength = rule.condition.evaluate(symptoms).unwrap_or(0.0);
            let slot = &mut strongest[rule.consequent.ordinal() as usize];
            *slot = slot.max(strength);
        }

        let mut degrees = [0.0_f64; 5];
        for p in Priority::ALL {
            if p != Priority::LOWEST {
                degrees[p.ordinal() as usize] = self.weights.get(p) * strongest[p.ordinal() as usize];
            }
        }

        // Most urgent first, strict comparison: ties keep the more urgent level.
        let mut priority = Priority::LOWEST;
        let mut best = 0.0;
        for p in Priority::ALL {
            let degree = degrees[p.ordinal() as usize];
            if degree > best {
                best = degree;
                priority = p;
            }
        }

        TriageOutcome {
            priority,
            max_wait_minutes: priority.max_wait_minutes(),
            degrees,
        }
    }
}

/// The nineteen chart rules.
pub fn default_rules() -> Vec<FuzzyRule> {
    use Antecedent::{All, Any, Absent, Present};
    use crate::priority::Priority::*;
    use crate::symptoms::Symptom::*;

    vec![
        FuzzyRule::new("airway compromise", Absent(Airway), Immediate),
        FuzzyRule::new(
            "inadequate oxygenation",
            Antecedent::is(Oxygenation, "inadequate"),
            Immediate,
        ),
        FuzzyRule::new(
            "shock",
            All(vec![
                Antecedent::is_any(Sweating, &["significant", "exceptional"]),
                Antecedent::is(Colour, "pale"),
                Antecedent::is_any(HeartRate, &["vigorous", "very vigorous"]),
                Antecedent::is(BloodPressure, "low"),
                Antecedent::is_any(ConsciousLevel, &["reduced", "unresponsive"]),
            ]),
            Immediate,
        ),
        FuzzyRule::new(
            "exsanguinating haemorrhage",
            Antecedent::is(Haemorrhage, "exsanguinating"),
            Immediate,
        ),
        FuzzyRule::new("severe pain", Antecedent::is(Pain, "severe"), VeryUrgent),
        FuzzyRule::new(
            "significant mechanism of injury",
            Antecedent::is(MechanismOfInjury, "significant"),
            VeryUrgent,
        ),
        FuzzyRule::new(
            "acute shortness of breath",
            All(vec![
                Present(ShortnessOfBreath),
                Antecedent::is_any(Onset, &["acute", "rapid", "abrupt"]),
            ]),
            VeryUrgent,
        ),
        FuzzyRule::new(
            "acute neurological deficit",
            All(vec![
                Present(NeurologicalDeficit),
                Antecedent::is_any(NeurologicalOnset, &["abrupt", "rapid", "acute"]),
            ]),
            VeryUrgent,
        ),
        FuzzyRule::new(
            "altered conscious level",
            Antecedent::is_any(ConsciousLevel, &["slightly reduced", "reduced", "unresponsive"]),
            VeryUrgent,
        ),
        FuzzyRule::new(
            "uncontrollable major haemorrhage",
            All(vec![
                Present(UncontrollableBleeding),
                Antecedent::is(Haemorrhage, "major"),
            ]),
            VeryUrgent,
        ),
        FuzzyRule::new("untruthful story", Present(UntruthfulStory), Urgent),
        FuzzyRule::new(
            "recent neurological deficit",
            All(vec![
                Present(NeurologicalDeficit),
                Antecedent::is(NeurologicalOnset, "recent"),
            ]),
            Urgent,
        ),
        FuzzyRule::new(
            "uncontrollable minor haemorrhage",
            All(vec![
                Present(UncontrollableBleeding),
                Antecedent::is(Haemorrhage, "minor"),
            ]),
            Urgent,
        ),
        FuzzyRule::new(
            "history of unconsciousness",
            Present(HistoryOfUnconsciousness),
            Urgent,
        ),
        FuzzyRule::new("moderate pain", Antecedent::is(Pain, "moderate"), Urgent),
        FuzzyRule::new("swelling", Present(Swelling), Standard),
        FuzzyRule::new(
            "deformity",
            Any(vec![
                Antecedent::is(Deformity, "moderate"),
                Antecedent::is(Deformity, "significant"),
            ]),
            Standard,
        ),
        FuzzyRule::new("mild pain", Antecedent::is(Pain, "mild"), Standard),
        FuzzyRule::new(
            "recent onset of symptoms",
            Antecedent::is(OnsetOfSymptoms, "recent"),
            Standard,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> MtsClassifier {
        MtsClassifier::manchester(PriorityWeights::default()).unwrap()
    }

    #[test]
    fn test_default_rule_count() {
        assert_eq!(classifier().rule_count(), 19);
    }

    #[test]
    fn test_empty_input_is_non_urgent() {
        let outcome = classifier().classify(&SymptomVector::new());
        assert_eq!(outcome.priority, Priority::NonUrgent);
        assert_eq!(outcome.max_wait_minutes, 240.0);
        assert!(outcome.degrees.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_airway_not_maintained() {
        let v = SymptomVector::new().with(Symptom::Airway, 0.0);
        assert_eq!(classifier().classify(&v).priority, Priority::Immediate);
        let v = SymptomVector::new().with(Symptom::Airway, 1.0);
        assert_eq!(classifier().classify(&v).priority, Priority::NonUrgent);
    }

    #[test]
    fn test_shock_needs_every_sign() {
        let shocked = SymptomVector::new()
            .with(Symptom::Sweating, 9.5)
            .with(Symptom::Colour, 1.0)
            .with(Symptom::HeartRate, 160.0)
            .with(Symptom::BloodPressure, 60.0)
            .with(Symptom::ConsciousLevel, 4.0);
        assert_eq!(classifier().classify(&shocked).priority, Priority::Immediate);

        // Reduced consciousness alone still fires the very-urgent rule.
        let mut partial = shocked.clone();
        partial.clear(Symptom::BloodPressure);
        assert_eq!(classifier().classify(&partial).priority, Priority::VeryUrgent);
    }

    #[test]
    fn test_tie_prefers_more_urgent() {
        let v = SymptomVector::new()
            .with(Symptom::ShortnessOfBreath, 0.6)
            .with(Symptom::Onset, 6.0)
            .with(Symptom::UntruthfulStory, 0.8);
        let outcome = classifier().classify(&v);
        assert_eq!(
            outcome.degrees[Priority::VeryUrgent.ordinal() as usize],
            outcome.degrees[Priority::Urgent.ordinal() as usize]
        );
        assert_eq!(outcome.priority, Priority::VeryUrgent);
        assert_eq!(outcome.max_wait_minutes, 10.0);
    }

    #[test]
    fn test_weights_change_outcome() {
        let v = SymptomVector::new()
            .with(Symptom::Pain, 3.0)
            .with(Symptom::HistoryOfUnconsciousness, 0.5);
        // standard 0.4 * 0.5 = 0.2 vs urgent 0.6 * 0.5 = 0.3
        assert_eq!(classifier().classify(&v).priority, Priority::Urgent);

        let weights = PriorityWeights {
            urgent: 0.2,
            ..PriorityWeights::default()
        };
        let c = MtsClassifier::manchester(weights).unwrap();
        assert_eq!(c.classify(&v).priority, Priority::Standard);
    }

    #[test]
    fn test_unknown_term_rejected_at_construction() {
        let registry = FuzzyRegistry::manchester().unwrap();
        let rules = vec![FuzzyRule::new(
            "bogus",
            Antecedent::is(Symptom::Pain, "unbearable"),
            Priority::Immediate,
        )];
        let err = MtsClassifier::new(&registry, &rules, PriorityWeights::default()).unwrap_err();
        assert_eq!(
            err,
            FuzzyError::UnknownSymbol {
                variable: "pain".into(),
                term: "unbearable".into()
            }
        );
    }

    #[test]
    fn test_missing_reading_zeroes_the_rule() {
        // Neurological deficit without an onset reading cannot fire either rule.
        let v = SymptomVector::new().with(Symptom::NeurologicalDeficit, 1.0);
        let c = classifier();
        let firings = c.firings(&v);
        assert!(firings.iter().all(|f| f.strength == 0.0));
        assert_eq!(c.classify(&v).priority, Priority::NonUrgent);
    }

    #[test]
    fn test_firings_report_strengths() {
        let v = SymptomVector::new().with(Symptom::Pain, 9.0);
        let firings = classifier().firings(&v);
        let severe = firings.iter().find(|f| f.rule == "severe pain").unwrap();
        assert_eq!(severe.strength, 1.0);
        assert_eq!(severe.consequent, Priority::VeryUrgent);
    }

    #[test]
    fn test_indicator_values_are_clamped() {
        let v = SymptomVector::new().with(Symptom::Swelling, 4.0);
        let outcome = classifier().classify(&v);
        assert_eq!(outcome.priority, Priority::Standard);
        assert!((outcome.degrees[Priority::Standard.ordinal() as usize] - 0.4).abs() < 1e-12);
    }
}
