use scholarsim_data::{FactorBatch, FactorCategory, Roster};
use serde::{Deserialize, Serialize};

pub const SIMULATION_DATA: &str = "simulation_data";

/// Cache keys of one run, namespaced as `{run_id}:{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    run_id: String,
}

impl CacheKeys {
    #[must_use]
    pub fn new<S: Into<String>>(run_id: S) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn simulation_data(&self) -> String {
        self.key(SIMULATION_DATA)
    }

    #[must_use]
    pub fn factor(&self, category: FactorCategory) -> String {
        self.key(category.cache_name())
    }

    /// Every key a full state occupies: simulation data first, then the
    /// three lookups in category order.
    #[must_use]
    pub fn all(&self) -> [String; 4] {
        [
            self.simulation_data(),
            self.factor(FactorCategory::Internal),
            self.factor(FactorCategory::External),
            self.factor(FactorCategory::Institutional),
        ]
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.run_id, name)
    }
}

/// The `simulation_data` entry: what was loaded and how far the run got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationData {
    pub tick: u64,
    pub roster: Roster,
    /// The grouped records of the last full load.
    pub batch: FactorBatch,
    /// Fingerprint of the engine parameters the run was started with.
    pub config_fingerprint: String,
}
