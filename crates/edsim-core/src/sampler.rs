//! Service-time sampling.
//!
//! One log-normal per (resource kind, priority) is built up front so a bad
//! profile fails before the run starts. Non-urgent bed stays draw from a
//! bounded uniform instead.

use edsim_logic::config::ConfigError;
use edsim_logic::priority::Priority;
use edsim_logic::resources::ResourceKind;
use edsim_logic::service_times::{priority_multiplier, uses_uniform_stay, ServiceTimeProfile};
use rand::distributions::Uniform;
use rand::RngCore;
use rand_distr::{Distribution, LogNormal};

#[derive(Debug, Clone)]
pub struct ServiceSampler {
    profile: ServiceTimeProfile,
    log_normals: Vec<[LogNormal<f64>; 5]>,
    non_urgent_bed: Uniform<f64>,
}

impl ServiceSampler {
    pub fn new(profile: ServiceTimeProfile) -> Result<Self, ConfigError> {
        if let Some(kind) = profile.invalid_kinds().first() {
            return Err(ConfigError::InvalidServiceTime(*kind));
        }

        let mut log_normals = Vec::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            let spec = profile.spec(kind);
            let build = |priority: Priority| {
                let (mu, sigma) = spec.log_normal_params(priority_multiplier(kind, priority));
                LogNormal::new(mu, sigma).map_err(|_| ConfigError::InvalidServiceTime(kind))
            };
            log_normals.push([
                build(Priority::Immediate)?,
                build(Priority::VeryUrgent)?,
                build(Priority::Urgent)?,
                build(Priority::Standard)?,
                build(Priority::NonUrgent)?,
            ]);
        }

        let (lo, hi) = profile.non_urgent_bed_bounds();
        let non_urgent_bed = Uniform::new_inclusive(lo, hi);

        Ok(Self {
            profile,
            log_normals,
            non_urgent_bed,
        })
    }

    /// Minutes of service at `kind` for a patient triaged at `priority`,
    /// clipped to the kind's limits.
    pub fn sample(&self, kind: ResourceKind, priority: Priority, rng: &mut dyn RngCore) -> f64 {
        let raw = if uses_uniform_stay(kind, priority) {
            self.non_urgent_bed.sample(rng)
        } else {
            self.log_normals[kind.index()][priority.ordinal() as usize].sample(rng)
        };
        self.profile.spec(kind).clip(raw)
    }

    pub fn profile(&self) -> &ServiceTimeProfile {
        &self.profile
    }
}
