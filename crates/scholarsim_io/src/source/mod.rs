//! Read side of the relational store: factor records grouped per simulation.

pub mod sqlite;

pub use sqlite::{SqliteSource, SCHEMA_SQL};

use crate::error::{Result, StoreError};
use scholarsim_data::{
    FactorBatch, FactorCategory, FactorRecord, GroupKey, SimulationId, StudentId,
};
use std::collections::BTreeMap;

/// Anything that can hand over the factor records of a simulation.
pub trait FactorSource: Send + Sync {
    /// Known simulations in id order.
    fn simulations(&self) -> Result<Vec<SimulationId>>;

    /// The grouped records of one simulation. The single group key of each
    /// category carries the simulation's enrolled students.
    fn load_simulation(&self, simulation_id: SimulationId) -> Result<FactorBatch>;
}

/// Source backed by plain vectors, for tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    simulations: BTreeMap<SimulationId, Vec<StudentId>>,
    records: Vec<FactorRecord>,
}

impl InMemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a simulation with its students in enrollment order.
    pub fn add_simulation(
        &mut self,
        simulation_id: SimulationId,
        students: impl IntoIterator<Item = StudentId>,
    ) -> &mut Self {
        self.simulations
            .insert(simulation_id, students.into_iter().collect());
        self
    }

    pub fn add_record(&mut self, record: impl Into<FactorRecord>) -> &mut Self {
        self.records.push(record.into());
        self
    }
}

impl FactorSource for InMemorySource {
    fn simulations(&self) -> Result<Vec<SimulationId>> {
        Ok(self.simulations.keys().copied().collect())
    }

    fn load_simulation(&self, simulation_id: SimulationId) -> Result<FactorBatch> {
        let students = self
            .simulations
            .get(&simulation_id)
            .ok_or_else(|| StoreError::backend(format!("unknown simulation {simulation_id}")))?;
        let key = GroupKey::new(simulation_id, students.clone());

        let mut batch = FactorBatch::new();
        for category in FactorCategory::ALL {
            batch.get_mut(category).insert(
                key.clone(),
                self.records
                    .iter()
                    .filter(|r| r.category() == category && r.simulation_id() == simulation_id)
                    .cloned(),
            );
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsim_data::{InstitutionalFactors, InternalFactors, SimulationKey};

    #[test]
    fn test_load_simulation_groups_by_category() {
        let mut source = InMemorySource::new();
        source
            .add_simulation(1, [1, 2])
            .add_simulation(2, [3])
            .add_record(InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0))
            .add_record(InternalFactors::uniform(2, SimulationKey::new(2, 3), 5.0))
            .add_record(InstitutionalFactors::uniform(1, 1, 9, 6.0));

        assert_eq!(source.simulations().unwrap(), vec![1, 2]);
        let batch = source.load_simulation(1).unwrap();
        let key = GroupKey::new(1, vec![1, 2]);
        assert_eq!(batch.internal.get(&key).map(<[_]>::len), Some(1));
        assert_eq!(batch.institutional.get(&key).map(<[_]>::len), Some(1));
        assert_eq!(batch.external.get(&key).map(<[_]>::len), Some(0));
        assert_eq!(batch.roster().students(1), &[1, 2]);
    }

    #[test]
    fn test_unknown_simulation_is_error() {
        assert!(InMemorySource::new().load_simulation(4).is_err());
    }
}
