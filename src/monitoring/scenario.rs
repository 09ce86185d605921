use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::MonitoringConfig;
use crate::data::CleanedRecord;

/// A synthetic "current" batch: a seeded sample of the reference rows with
/// prices pushed up and tenure pulled down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftScenario {
    pub sample_fraction: f64,
    pub seed: u64,
    pub monthlycharges_factor: f64,
    pub tenure_shift: f64,
}

impl Default for DriftScenario {
    fn default() -> Self {
        Self::from_monitoring(&MonitoringConfig::default())
    }
}

impl DriftScenario {
    pub fn from_monitoring(config: &MonitoringConfig) -> Self {
        Self {
            sample_fraction: config.sample_fraction,
            seed: config.sample_seed,
            monthlycharges_factor: 1.15,
            tenure_shift: -3.0,
        }
    }

    /// Rows are sampled without replacement and keep their reference order.
    pub fn apply(&self, reference: &[CleanedRecord]) -> Vec<CleanedRecord> {
        let fraction = self.sample_fraction.clamp(0.0, 1.0);
        let amount = ((reference.len() as f64 * fraction).round() as usize).min(reference.len());

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut picked = index::sample(&mut rng, reference.len(), amount).into_vec();
        picked.sort_unstable();

        picked
            .into_iter()
            .map(|i| {
                let mut record = reference[i].clone();
                record.monthlycharges *= self.monthlycharges_factor;
                record.tenure += self.tenure_shift;
                record
            })
            .collect()
    }
}

/// [`DriftScenario::apply`] with the default scenario.
pub fn simulate_drift(reference: &[CleanedRecord]) -> Vec<CleanedRecord> {
    DriftScenario::default().apply(reference)
}
