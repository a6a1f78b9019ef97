//! Policy comparison: the same department and seed under each routing
//! policy.

use edsim_logic::config::SimulationConfig;
use edsim_logic::routing::PolicyKind;

use crate::engine::run_simulation;
use crate::error::SimError;
use crate::metrics::RunSummary;

/// Run `base` once per policy, in `PolicyKind::ALL` order
/// (rule_based, single_agent, multi_agent).
pub fn compare_policies(base: &SimulationConfig) -> Result<Vec<RunSummary>, SimError> {
    PolicyKind::ALL
        .iter()
        .map(|&policy| {
            let config = SimulationConfig {
                policy,
                record_trace: false,
                ..base.clone()
            };
            log::info!("comparison run: {policy}");
            run_simulation(config).map(|outcome| outcome.summary)
        })
        .collect()
}
