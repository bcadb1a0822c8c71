//! Flattens grouped per-simulation factor collections into direct-access maps
//! keyed by [`SimulationKey`].
//!
//! Internal and external records are matched on their explicit `student_id`;
//! an institutional record is matched to every enrolled student of the
//! simulation named by its `simulation_id`. Records that match nobody are
//! counted as orphans and skipped.

use crate::error::{EngineError, Result};
use scholarsim_data::{FactorCategory, FactorRecord, GroupedFactors, RatingRange, SimulationKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Category-tagged map from a student key to exactly one record.
///
/// Key collisions are resolved last-write-wins; each one is counted and
/// logged so duplicated input stays visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LookupSnapshot", try_from = "LookupSnapshot")]
pub struct LookupMap {
    category: FactorCategory,
    entries: BTreeMap<SimulationKey, FactorRecord>,
    collisions: usize,
}

impl LookupMap {
    #[must_use]
    pub fn new(category: FactorCategory) -> Self {
        Self {
            category,
            entries: BTreeMap::new(),
            collisions: 0,
        }
    }

    #[must_use]
    pub fn category(&self) -> FactorCategory {
        self.category
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of key collisions resolved while building or merging this map.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    #[must_use]
    pub fn get(&self, key: &SimulationKey) -> Option<&FactorRecord> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &SimulationKey) -> Option<&mut FactorRecord> {
        self.entries.get_mut(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &SimulationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts with last-write-wins semantics, returning the replaced record.
    pub fn insert(&mut self, key: SimulationKey, record: FactorRecord) -> Option<FactorRecord> {
        let previous = self.entries.insert(key, record);
        if let Some(old) = &previous {
            self.collisions += 1;
            tracing::warn!(
                category = %self.category,
                key = %key,
                replaced_record = old.id(),
                "Duplicate lookup key, keeping the later record"
            );
        }
        previous
    }

    /// Moves every entry of `other` into `self`, later entries winning.
    /// Returns the number of collisions this call resolved.
    pub fn absorb(&mut self, other: LookupMap) -> usize {
        let before = self.collisions;
        for (key, record) in other.entries {
            self.insert(key, record);
        }
        let resolved = self.collisions - before;
        self.collisions += other.collisions;
        resolved
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SimulationKey, &FactorRecord)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SimulationKey> {
        self.entries.keys()
    }

}

/// Wire form of a [`LookupMap`]. Struct keys cannot be JSON object keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSnapshot {
    pub category: FactorCategory,
    #[serde(default)]
    pub collisions: usize,
    pub entries: Vec<LookupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupEntry {
    pub key: SimulationKey,
    pub record: FactorRecord,
}

impl From<LookupMap> for LookupSnapshot {
    fn from(map: LookupMap) -> Self {
        Self {
            category: map.category,
            collisions: map.collisions,
            entries: map
                .entries
                .into_iter()
                .map(|(key, record)| LookupEntry { key, record })
                .collect(),
        }
    }
}

impl TryFrom<LookupSnapshot> for LookupMap {
    type Error = EngineError;

    fn try_from(snapshot: LookupSnapshot) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for LookupEntry { key, record } in snapshot.entries {
            if record.category() != snapshot.category {
                return Err(EngineError::malformed(format!(
                    "{} record {} stored in the {} lookup",
                    record.category(),
                    record.id(),
                    snapshot.category
                )));
            }
            if record.simulation_id() != key.simulation_id
                || record.student_id().is_some_and(|s| s != key.student_id)
            {
                return Err(EngineError::malformed(format!(
                    "record {} stored under foreign key {}",
                    record.id(),
                    key
                )));
            }
            if entries.insert(key, record).is_some() {
                return Err(EngineError::malformed(format!(
                    "key {key} appears twice in the {} snapshot",
                    snapshot.category
                )));
            }
        }
        Ok(Self {
            category: snapshot.category,
            entries,
            collisions: snapshot.collisions,
        })
    }
}

/// Builds lookups, validating every rating against one range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupBuilder {
    pub range: RatingRange,
}

impl Default for LookupBuilder {
    fn default() -> Self {
        Self {
            range: RatingRange::CANONICAL,
        }
    }
}

impl LookupBuilder {
    #[must_use]
    pub fn new(range: RatingRange) -> Self {
        Self { range }
    }

    pub fn build(&self, grouped: &GroupedFactors, category: FactorCategory) -> Result<LookupMap> {
        let mut lookup = LookupMap::new(category);
        let mut orphans = 0usize;

        for (group, records) in grouped.iter() {
            let mut enrolled = HashSet::with_capacity(group.student_ids.len());
            for student_id in &group.student_ids {
                if !enrolled.insert(*student_id) {
                    return Err(EngineError::malformed(format!(
                        "student {student_id} listed twice for simulation {}",
                        group.simulation_id
                    )));
                }
            }

            for record in records {
                self.validate(record, category)?;
                if record.simulation_id() != group.simulation_id {
                    orphans += 1;
                    tracing::debug!(
                        category = %category,
                        record = record.id(),
                        simulation = group.simulation_id,
                        "Record belongs to another simulation"
                    );
                    continue;
                }
                match record.student_id() {
                    Some(student_id) if enrolled.contains(&student_id) => {
                        lookup.insert(
                            SimulationKey::new(group.simulation_id, student_id),
                            record.clone(),
                        );
                    }
                    Some(student_id) => {
                        orphans += 1;
                        tracing::debug!(
                            category = %category,
                            record = record.id(),
                            student = student_id,
                            simulation = group.simulation_id,
                            "Record owner is not enrolled in the simulation"
                        );
                    }
                    None if group.student_ids.is_empty() => orphans += 1,
                    None => {
                        for student_id in &group.student_ids {
                            lookup.insert(
                                SimulationKey::new(group.simulation_id, *student_id),
                                record.clone(),
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(
            category = %category,
            entries = lookup.len(),
            orphans = orphans,
            collisions = lookup.collisions(),
            "Lookup built"
        );
        Ok(lookup)
    }

    fn validate(&self, record: &FactorRecord, category: FactorCategory) -> Result<()> {
        if record.category() != category {
            return Err(EngineError::malformed(format!(
                "{} record {} found in {} input",
                record.category(),
                record.id(),
                category
            )));
        }
        for (field, value) in record.named_ratings() {
            if !self.range.contains(value) {
                return Err(EngineError::malformed(format!(
                    "{} record {}: {} = {} outside [{}, {}]",
                    category,
                    record.id(),
                    field,
                    value,
                    self.range.min,
                    self.range.max
                )));
            }
        }
        Ok(())
    }
}

/// Builds the lookup for one category with the canonical rating range.
pub fn build_lookup(grouped: &GroupedFactors, category: FactorCategory) -> Result<LookupMap> {
    LookupBuilder::default().build(grouped, category)
}

/// Like [`build_lookup`], taking the category as a tag such as
/// `"mem_internal_factor"`.
pub fn build_lookup_tagged(grouped: &GroupedFactors, tag: &str) -> Result<LookupMap> {
    let category: FactorCategory = tag.parse()?;
    build_lookup(grouped, category)
}
