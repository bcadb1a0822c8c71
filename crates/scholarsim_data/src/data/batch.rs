//! Grouped, list-valued load structures handed over by the relational side.

use super::factor::{FactorCategory, FactorRecord};
use super::key::{SimulationId, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A simulation together with the students enrolled in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub simulation_id: SimulationId,
    pub student_ids: Vec<StudentId>,
}

impl GroupKey {
    #[must_use]
    pub fn new(simulation_id: SimulationId, student_ids: Vec<StudentId>) -> Self {
        Self {
            simulation_id,
            student_ids,
        }
    }
}

/// Serialized form of one group. Maps with composite keys cannot be JSON
/// objects, so groups travel as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorGroup {
    pub key: GroupKey,
    pub records: Vec<FactorRecord>,
}

/// Records of one category grouped by (simulation, enrolled students).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<FactorGroup>", from = "Vec<FactorGroup>")]
pub struct GroupedFactors {
    groups: BTreeMap<GroupKey, Vec<FactorRecord>>,
}

impl GroupedFactors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `records` to the group under `key`, creating it if needed.
    pub fn insert(&mut self, key: GroupKey, records: impl IntoIterator<Item = FactorRecord>) {
        self.groups.entry(key).or_default().extend(records);
    }

    /// Extends every group with the records of `other`. Existing entries are
    /// never dropped.
    pub fn merge(&mut self, other: GroupedFactors) {
        for (key, records) in other.groups {
            self.insert(key, records);
        }
    }

    #[must_use]
    pub fn get(&self, key: &GroupKey) -> Option<&[FactorRecord]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &[FactorRecord])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl From<Vec<FactorGroup>> for GroupedFactors {
    fn from(groups: Vec<FactorGroup>) -> Self {
        let mut grouped = Self::new();
        for group in groups {
            grouped.insert(group.key, group.records);
        }
        grouped
    }
}

impl From<GroupedFactors> for Vec<FactorGroup> {
    fn from(grouped: GroupedFactors) -> Self {
        grouped
            .groups
            .into_iter()
            .map(|(key, records)| FactorGroup { key, records })
            .collect()
    }
}

/// Everything one load from the relational side produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FactorBatch {
    pub internal: GroupedFactors,
    pub external: GroupedFactors,
    pub institutional: GroupedFactors,
}

impl FactorBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, category: FactorCategory) -> &GroupedFactors {
        match category {
            FactorCategory::Internal => &self.internal,
            FactorCategory::External => &self.external,
            FactorCategory::Institutional => &self.institutional,
        }
    }

    pub fn get_mut(&mut self, category: FactorCategory) -> &mut GroupedFactors {
        match category {
            FactorCategory::Internal => &mut self.internal,
            FactorCategory::External => &mut self.external,
            FactorCategory::Institutional => &mut self.institutional,
        }
    }

    pub fn merge(&mut self, other: FactorBatch) {
        self.internal.merge(other.internal);
        self.external.merge(other.external);
        self.institutional.merge(other.institutional);
    }

    /// Enrolled students per simulation across every category's group keys.
    #[must_use]
    pub fn roster(&self) -> Roster {
        let mut roster = Roster::default();
        for category in FactorCategory::ALL {
            for key in self.get(category).keys() {
                roster.enroll_all(key.simulation_id, key.student_ids.iter().copied());
            }
        }
        roster
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.internal.record_count()
            + self.external.record_count()
            + self.institutional.record_count()
    }
}

/// Simulations in id order, each with its students in enrollment order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Roster {
    simulations: BTreeMap<SimulationId, Vec<StudentId>>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a simulation even when nobody is enrolled yet.
    pub fn add_simulation(&mut self, simulation_id: SimulationId) {
        self.simulations.entry(simulation_id).or_default();
    }

    pub fn enroll(&mut self, simulation_id: SimulationId, student_id: StudentId) {
        let students = self.simulations.entry(simulation_id).or_default();
        if !students.contains(&student_id) {
            students.push(student_id);
        }
    }

    pub fn enroll_all(
        &mut self,
        simulation_id: SimulationId,
        student_ids: impl IntoIterator<Item = StudentId>,
    ) {
        self.add_simulation(simulation_id);
        for student_id in student_ids {
            self.enroll(simulation_id, student_id);
        }
    }

    pub fn merge(&mut self, other: &Roster) {
        for (simulation_id, students) in &other.simulations {
            self.enroll_all(*simulation_id, students.iter().copied());
        }
    }

    #[must_use]
    pub fn students(&self, simulation_id: SimulationId) -> &[StudentId] {
        self.simulations
            .get(&simulation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (SimulationId, &[StudentId])> {
        self.simulations.iter().map(|(id, s)| (*id, s.as_slice()))
    }

    pub fn simulation_ids(&self) -> impl Iterator<Item = SimulationId> + '_ {
        self.simulations.keys().copied()
    }

    #[must_use]
    pub fn simulation_count(&self) -> usize {
        self.simulations.len()
    }

    #[must_use]
    pub fn student_count(&self) -> usize {
        self.simulations.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.simulations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::factor::InternalFactors;
    use crate::data::key::SimulationKey;

    fn internal(id: u64, sim: u64, student: u64) -> FactorRecord {
        InternalFactors::uniform(id, SimulationKey::new(sim, student), 5.0).into()
    }

    #[test]
    fn test_insert_extends_existing_group() {
        let key = GroupKey::new(1, vec![1, 2]);
        let mut grouped = GroupedFactors::new();
        grouped.insert(key.clone(), [internal(1, 1, 1)]);
        grouped.insert(key.clone(), [internal(2, 1, 2)]);
        assert_eq!(grouped.get(&key).map(<[_]>::len), Some(2));
        assert_eq!(grouped.record_count(), 2);
    }

    #[test]
    fn test_grouped_serializes_as_list() {
        let mut grouped = GroupedFactors::new();
        grouped.insert(GroupKey::new(3, vec![7]), [internal(7, 3, 7)]);
        let json = serde_json::to_string(&grouped).unwrap();
        assert!(json.starts_with('['));
        let restored: GroupedFactors = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, grouped);
    }

    #[test]
    fn test_roster_dedupes_and_keeps_order() {
        let mut batch = FactorBatch::new();
        batch
            .internal
            .insert(GroupKey::new(2, vec![5, 4]), [internal(5, 2, 5)]);
        batch
            .external
            .insert(GroupKey::new(2, vec![4, 6]), Vec::new());
        batch.institutional.insert(GroupKey::new(1, vec![]), Vec::new());

        let roster = batch.roster();
        assert_eq!(roster.simulation_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(roster.students(2), &[5, 4, 6]);
        assert!(roster.students(1).is_empty());
        assert_eq!(roster.student_count(), 3);
    }

    #[test]
    fn test_roster_survives_json_with_integer_keys() {
        let mut roster = Roster::new();
        roster.enroll_all(10, [1, 2, 3]);
        let json = serde_json::to_string(&roster).unwrap();
        let restored: Roster = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, roster);
    }
}
