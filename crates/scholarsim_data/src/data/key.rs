use serde::{Deserialize, Serialize};
use std::fmt;

pub type SimulationId = u64;
pub type StudentId = u64;
pub type RecordId = u64;
pub type UniversityId = u64;

/// Addresses one student's factor records inside one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimulationKey {
    pub simulation_id: SimulationId,
    pub student_id: StudentId,
}

impl SimulationKey {
    #[must_use]
    pub const fn new(simulation_id: SimulationId, student_id: StudentId) -> Self {
        Self {
            simulation_id,
            student_id,
        }
    }
}

impl From<(SimulationId, StudentId)> for SimulationKey {
    fn from((simulation_id, student_id): (SimulationId, StudentId)) -> Self {
        Self::new(simulation_id, student_id)
    }
}

impl fmt::Display for SimulationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.simulation_id, self.student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_is_simulation_major() {
        let mut keys = vec![
            SimulationKey::new(2, 1),
            SimulationKey::new(1, 9),
            SimulationKey::new(1, 3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SimulationKey::new(1, 3),
                SimulationKey::new(1, 9),
                SimulationKey::new(2, 1)
            ]
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(SimulationKey::from((4, 7)).to_string(), "(4, 7)");
    }
}
