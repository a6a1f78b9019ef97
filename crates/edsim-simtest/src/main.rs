//! EDSim Headless Simulation Harness
//!
//! Validates the triage classifier, configuration checks and end-to-end
//! department scenarios. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p edsim-simtest
//!   cargo run -p edsim-simtest -- --verbose
//!   cargo run -p edsim-simtest -- --config run.json
//!
//! With `--config` the harness runs that one configuration and prints the
//! summary and its analysis as JSON instead of the checks.

use edsim_core::analysis::analyze;
use edsim_core::experiment::compare_policies;
use edsim_core::generation::{PresentationSampler, PRESENTATIONS};
use edsim_core::prelude::*;
use edsim_core::trace::EventPayload;
use edsim_logic::config::{ConfigError, PatientRecord, PatientSourceConfig};
use edsim_logic::fuzzy::FuzzyRegistry;
use edsim_logic::mts::MtsClassifier;
use edsim_logic::priority::PriorityWeights;
use edsim_logic::symptoms::{Symptom, SymptomVector};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    if let Some(path) = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
    {
        if let Err(e) = run_config_file(path) {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
        return;
    }

    println!("=== EDSim Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Triage classifier
    results.extend(validate_classifier(verbose));

    // 2. Configuration validation
    results.extend(validate_configuration(verbose));

    // 3. Routing policies
    results.extend(validate_routing(verbose));

    // 4. Preemption scenarios
    results.extend(validate_preemption(verbose));

    // 5. Determinism and policy comparison
    results.extend(validate_reproducibility(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn run_config_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    let config = SimulationConfig::from_json(&json)?;
    log::info!("running {path}: policy={} seed={}", config.policy, config.seed);
    let summary = run_simulation(config)?.summary;
    let report = serde_json::json!({
        "summary": summary,
        "analysis": analyze(&summary),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ── 1. Triage Classifier ────────────────────────────────────────────────

fn validate_classifier(verbose: bool) -> Vec<TestResult> {
    println!("--- Triage Classifier ---");
    let mut results = Vec::new();

    let classifier = match MtsClassifier::manchester(PriorityWeights::default()) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult::new(
                "classifier_build",
                false,
                format!("default rules failed to compile: {e}"),
            ));
            return results;
        }
    };
    results.push(TestResult::new(
        "classifier_build",
        true,
        format!("{} rules compiled", classifier.rule_count()),
    ));

    // Equal VERY_URGENT and URGENT degrees resolve to the more urgent level.
    let tie = SymptomVector::new()
        .with(Symptom::ShortnessOfBreath, 0.6)
        .with(Symptom::Onset, 6.0)
        .with(Symptom::UntruthfulStory, 0.8);
    let tie_priority = classifier.classify(&tie).priority;
    results.push(TestResult::new(
        "classifier_tie_break",
        tie_priority == Priority::VeryUrgent,
        format!("tie resolved to {tie_priority}"),
    ));

    let mut registry = FuzzyRegistry::new();
    let degenerate = registry
        .register("X", "term", (0.0, 0.0, 10.0, 10.0))
        .ok()
        .map(|_| {
            [0.0, 5.0, 10.0]
                .iter()
                .all(|&x| registry.membership("X", "term", x).ok() == Some(1.0))
        })
        .unwrap_or(false);
    results.push(TestResult::new(
        "membership_degenerate_shoulders",
        degenerate,
        "trapezoid (0,0,10,10) is 1 at 0, 5 and 10",
    ));

    // Every synthetic presentation classifies, and every level is reached.
    match PresentationSampler::new() {
        Ok(sampler) => {
            let mut rng = StdRng::seed_from_u64(42);
            let mut counts = [0usize; 5];
            for _ in 0..5000 {
                let (_, symptoms) = sampler.sample(&mut rng);
                counts[classifier.classify(&symptoms).priority.ordinal() as usize] += 1;
            }
            if verbose {
                for priority in Priority::ALL {
                    println!(
                        "    {:<11} {:>5}",
                        priority.label(),
                        counts[priority.ordinal() as usize]
                    );
                }
            }
            results.push(TestResult::new(
                "synthetic_mix_reaches_every_level",
                counts.iter().all(|&c| c > 0),
                format!(
                    "{} presentations, level counts {:?}",
                    PRESENTATIONS.len(),
                    counts
                ),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "synthetic_mix_reaches_every_level",
            false,
            format!("sampler: {e}"),
        )),
    }

    results
}

// ── 2. Configuration ────────────────────────────────────────────────────

fn validate_configuration(_verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let defaults = SimulationConfig::default().validate();
    results.push(TestResult::new(
        "config_defaults_valid",
        defaults.is_empty(),
        format!("{} problems", defaults.len()),
    ));

    let zero_horizon = SimulationConfig {
        horizon_minutes: 0,
        ..SimulationConfig::default()
    };
    results.push(TestResult::new(
        "config_zero_horizon_rejected",
        matches!(
            run_simulation(zero_horizon),
            Err(SimError::InvalidConfiguration(ConfigError::ZeroHorizon))
        ),
        "horizon 0 fails before the run",
    ));

    let unknown = SimulationConfig::from_json(r#"{"policy": "random"}"#);
    results.push(TestResult::new(
        "config_unknown_policy_rejected",
        matches!(unknown, Err(ConfigError::UnknownPolicy(_))),
        format!("{unknown:?}").chars().take(80).collect::<String>(),
    ));

    let unstaffed = SimulationConfig {
        capacities: Capacities {
            mri: 0,
            ..Capacities::default()
        },
        ..SimulationConfig::default()
    };
    results.push(TestResult::new(
        "config_unstaffed_mri_rejected",
        matches!(
            unstaffed.check(),
            Err(ConfigError::UnstaffedService(ResourceKind::Mri))
        ),
        "MRI capacity 0 with a non-zero MRI need",
    ));

    results
}

// ── 3. Routing ──────────────────────────────────────────────────────────

fn validate_routing(verbose: bool) -> Vec<TestResult> {
    println!("--- Routing ---");
    let mut results = Vec::new();

    let baseline = SimulationConfig {
        horizon_minutes: 5000,
        seed: 42,
        ..SimulationConfig::default()
    };
    match run_simulation(baseline) {
        Ok(outcome) => {
            let summary = &outcome.summary;
            let doctor_first = outcome
                .patients
                .iter()
                .filter(|p| p.needs.is_some())
                .all(|p| p.tasks.first() == Some(&ResourceKind::Doctor));
            results.push(TestResult::new(
                "rule_based_doctor_first",
                doctor_first && summary.urgent_care.bypassed == 0,
                format!(
                    "{} routed, bypass rate {:.3}",
                    summary.routed, summary.urgent_care.bypass_rate
                ),
            ));
            if verbose {
                let analysis = analyze(summary);
                println!(
                    "    efficiency {:.1}, bottleneck {:?}",
                    analysis.kpis.efficiency, analysis.kpis.bottleneck
                );
                for finding in &analysis.findings {
                    println!("    {finding}");
                }
            }
        }
        Err(e) => results.push(TestResult::new(
            "rule_based_doctor_first",
            false,
            format!("run failed: {e}"),
        )),
    }

    let urgent_mri = PatientRecord {
        priority: Some(Priority::Immediate),
        needs_mri: Some(true),
        needs_ultrasound: Some(false),
        ..PatientRecord::default()
    };
    let single = SimulationConfig {
        horizon_minutes: 6000,
        arrival_rate_per_hour: 60.0,
        capacities: Capacities {
            doctor: 50,
            mri: 50,
            bed: 500,
            ..Capacities::default()
        },
        policy: PolicyKind::SingleAgent,
        p_single: 0.8,
        patient_source: PatientSourceConfig::External {
            records: vec![urgent_mri],
            needs: Default::default(),
        },
        ..SimulationConfig::default()
    };
    match run_simulation(single) {
        Ok(outcome) => {
            let care = outcome.summary.urgent_care;
            results.push(TestResult::new(
                "single_agent_bypass_rate",
                care.immediate_mri_patients >= 5000 && (0.77..=0.83).contains(&care.bypass_rate),
                format!(
                    "{}/{} bypassed ({:.3})",
                    care.bypassed, care.immediate_mri_patients, care.bypass_rate
                ),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "single_agent_bypass_rate",
            false,
            format!("run failed: {e}"),
        )),
    }

    results
}

// ── 4. Preemption ───────────────────────────────────────────────────────

fn single_doctor() -> SimulationConfig {
    SimulationConfig {
        horizon_minutes: 1000,
        capacities: Capacities {
            triage: 1,
            doctor: 1,
            mri: 0,
            ultrasound: 0,
            bed: 1,
            blood_nurse: 0,
        },
        record_trace: true,
        ..SimulationConfig::default()
    }
}

fn run_scripted(arrivals: Vec<Arrival>) -> Result<RunOutcome, SimError> {
    EdSimulation::scripted(single_doctor(), arrivals)?.run()
}

fn validate_preemption(_verbose: bool) -> Vec<TestResult> {
    println!("--- Preemption ---");
    let mut results = Vec::new();

    let doctor_case = run_scripted(vec![
        Arrival::triaged(0.0, Priority::Standard)
            .with_service(ResourceKind::Doctor, 30.0)
            .with_service(ResourceKind::Bed, 50.0),
        Arrival::triaged(1.0, Priority::Immediate)
            .with_service(ResourceKind::Doctor, 10.0)
            .with_service(ResourceKind::Bed, 20.0),
    ]);
    match doctor_case {
        Ok(outcome) => {
            let standard = &outcome.patients[0];
            let immediate = &outcome.patients[1];
            let first_done = immediate.completed_at < standard.completed_at;
            results.push(TestResult::new(
                "doctor_preempted_by_immediate",
                standard.preemptions == 1 && first_done,
                format!(
                    "STANDARD preempted {}x, peak {:?}; IMMEDIATE done at {:?}",
                    standard.preemptions, standard.peak, immediate.completed_at
                ),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "doctor_preempted_by_immediate",
            false,
            format!("run failed: {e}"),
        )),
    }

    let bed_case = run_scripted(vec![
        Arrival::triaged(0.0, Priority::Standard)
            .with_service(ResourceKind::Doctor, 5.0)
            .with_service(ResourceKind::Bed, 300.0),
        Arrival::triaged(10.0, Priority::Immediate)
            .with_service(ResourceKind::Doctor, 5.0)
            .with_service(ResourceKind::Bed, 20.0),
    ]);
    match bed_case {
        Ok(outcome) => {
            let evictions = outcome.trace.as_ref().map_or(0, |t| {
                t.records
                    .iter()
                    .filter(|r| matches!(r.payload, EventPayload::Preempted { .. }))
                    .count()
            });
            let bed_start = outcome.patients[1]
                .records
                .iter()
                .find(|r| r.kind == ResourceKind::Bed)
                .and_then(|r| r.started_at);
            results.push(TestResult::new(
                "bed_not_preempted",
                evictions == 0 && bed_start == Some(305.0),
                format!("{evictions} evictions, IMMEDIATE bed from {bed_start:?}"),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "bed_not_preempted",
            false,
            format!("run failed: {e}"),
        )),
    }

    results
}

// ── 5. Reproducibility ──────────────────────────────────────────────────

fn validate_reproducibility(verbose: bool) -> Vec<TestResult> {
    println!("--- Reproducibility ---");
    let mut results = Vec::new();

    let config = SimulationConfig {
        horizon_minutes: 1440,
        policy: PolicyKind::MultiAgent,
        record_trace: true,
        ..SimulationConfig::default()
    };
    let bytes = |config: &SimulationConfig| -> Option<Vec<u8>> {
        run_simulation(config.clone())
            .ok()?
            .trace?
            .to_bytes()
            .ok()
    };
    let (a, b) = (bytes(&config), bytes(&config));
    results.push(TestResult::new(
        "trace_bytes_identical",
        a.is_some() && a == b,
        format!("{} bytes", a.as_ref().map_or(0, Vec::len)),
    ));

    match compare_policies(&config) {
        Ok(summaries) => {
            if verbose {
                for s in &summaries {
                    println!(
                        "    {:<12} completed {:>4}  bypass {:.3}  four-hour breaches {:>4} ({:.1}% within)",
                        s.policy.label(),
                        s.completed,
                        s.urgent_care.bypass_rate,
                        s.compliance.four_hour_breaches,
                        s.nhs.four_hour_pct
                    );
                }
            }
            results.push(TestResult::new(
                "policy_comparison",
                summaries.len() == 3 && summaries[0].urgent_care.bypassed == 0,
                format!("{} policies compared", summaries.len()),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "policy_comparison",
            false,
            format!("comparison failed: {e}"),
        )),
    }

    results
}
