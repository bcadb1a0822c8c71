use crate::error::{EngineError, Result};
use crate::lookup::{LookupBuilder, LookupMap};
use scholarsim_data::{FactorBatch, FactorCategory, FactorRecord, Roster, SimulationKey};
use serde::{Deserialize, Serialize};

/// The in-memory index one run evolves tick after tick.
///
/// Owned explicitly by whoever drives the run; there is no process-wide
/// instance. Continuity between processes goes through the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub tick: u64,
    pub roster: Roster,
    internal: LookupMap,
    external: LookupMap,
    institutional: LookupMap,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            tick: 0,
            roster: Roster::new(),
            internal: LookupMap::new(FactorCategory::Internal),
            external: LookupMap::new(FactorCategory::External),
            institutional: LookupMap::new(FactorCategory::Institutional),
        }
    }
}

impl MemoryState {
    /// Builds all three lookups of one load batch with the canonical range.
    pub fn create(batch: &FactorBatch) -> Result<Self> {
        Self::create_with(&LookupBuilder::default(), batch)
    }

    pub fn create_with(builder: &LookupBuilder, batch: &FactorBatch) -> Result<Self> {
        Ok(Self {
            tick: 0,
            roster: batch.roster(),
            internal: builder.build(&batch.internal, FactorCategory::Internal)?,
            external: builder.build(&batch.external, FactorCategory::External)?,
            institutional: builder.build(&batch.institutional, FactorCategory::Institutional)?,
        })
    }

    /// Reassembles a state from separately stored lookups.
    pub fn from_parts(
        tick: u64,
        roster: Roster,
        internal: LookupMap,
        external: LookupMap,
        institutional: LookupMap,
    ) -> Result<Self> {
        for (expected, map) in [
            (FactorCategory::Internal, &internal),
            (FactorCategory::External, &external),
            (FactorCategory::Institutional, &institutional),
        ] {
            if map.category() != expected {
                return Err(EngineError::malformed(format!(
                    "{} lookup supplied where {} was expected",
                    map.category(),
                    expected
                )));
            }
        }
        Ok(Self {
            tick,
            roster,
            internal,
            external,
            institutional,
        })
    }

    /// Splits the state back into its stored parts.
    #[must_use]
    pub fn into_parts(self) -> (u64, Roster, LookupMap, LookupMap, LookupMap) {
        (
            self.tick,
            self.roster,
            self.internal,
            self.external,
            self.institutional,
        )
    }

    /// Combines two states. Rosters are unioned, lookups are merged
    /// last-write-wins with `incoming` winning, the tick is the later one.
    #[must_use]
    pub fn merge(base: MemoryState, incoming: MemoryState) -> MemoryState {
        let mut merged = base;
        merged.roster.merge(&incoming.roster);
        merged.tick = merged.tick.max(incoming.tick);

        let resolved = merged.internal.absorb(incoming.internal)
            + merged.external.absorb(incoming.external)
            + merged.institutional.absorb(incoming.institutional);
        if resolved > 0 {
            tracing::warn!(collisions = resolved, "Merge replaced existing factor records");
        }
        merged
    }

    #[must_use]
    pub fn lookup(&self, category: FactorCategory) -> &LookupMap {
        match category {
            FactorCategory::Internal => &self.internal,
            FactorCategory::External => &self.external,
            FactorCategory::Institutional => &self.institutional,
        }
    }

    pub fn lookup_mut(&mut self, category: FactorCategory) -> &mut LookupMap {
        match category {
            FactorCategory::Internal => &mut self.internal,
            FactorCategory::External => &mut self.external,
            FactorCategory::Institutional => &mut self.institutional,
        }
    }

    /// Lookup selected by tag, e.g. `"mem_external_factor"`.
    pub fn lookup_by_tag(&self, tag: &str) -> Result<&LookupMap> {
        let category: FactorCategory = tag.parse()?;
        Ok(self.lookup(category))
    }

    pub fn record(&self, category: FactorCategory, key: &SimulationKey) -> Result<&FactorRecord> {
        self.lookup(category)
            .get(key)
            .ok_or_else(|| EngineError::not_found(format!("{category} factors for {key}")))
    }

    /// Collisions resolved across all three lookups.
    #[must_use]
    pub fn collisions(&self) -> usize {
        FactorCategory::ALL
            .iter()
            .map(|c| self.lookup(*c).collisions())
            .sum()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        FactorCategory::ALL
            .iter()
            .map(|c| self.lookup(*c).len())
            .sum()
    }
}
