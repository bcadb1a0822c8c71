use super::codec::{self, CacheEntry};
use super::keys::{CacheKeys, SimulationData};
use super::{BlobWrite, Expect, KeyValueStore, Version};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Duration, Utc};
use scholarsim_core::{LookupMap, MemoryState};
use scholarsim_data::FactorCategory;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A value read from the cache together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub version: Version,
    pub written_at: DateTime<Utc>,
}

/// Versions of the four state keys as read at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateVersions {
    pub simulation_data: Version,
    pub internal: Version,
    pub external: Version,
    pub institutional: Version,
}

impl StateVersions {
    fn as_array(&self) -> [Version; 4] {
        [
            self.simulation_data,
            self.internal,
            self.external,
            self.institutional,
        ]
    }
}

/// A complete run state rebuilt from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedState {
    pub data: SimulationData,
    pub memory: MemoryState,
    pub versions: StateVersions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateLoad {
    Loaded(Box<CachedState>),
    /// At least one key is absent or expired; holds every such key.
    Missing(Vec<String>),
}

/// Typed, versioned access to a [`KeyValueStore`].
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn KeyValueStore>,
    ttl: Option<Duration>,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, ttl: None }
    }

    /// Entries written from now on expire after `ttl`.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Serializes `value` into a write guarded by `expected`.
    pub fn prepare<T: Serialize>(&self, key: &str, value: &T, expected: Expect) -> Result<BlobWrite> {
        let bytes = codec::encode(value, self.ttl, Utc::now())
            .map_err(|e| e.with_context(format!("encoding {key}")))?;
        Ok(BlobWrite {
            key: key.to_string(),
            bytes,
            expected,
        })
    }

    /// Unconditional write of one value.
    pub fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<Version> {
        let write = self.prepare(key, value, Expect::Any)?;
        let versions = self.store.set_many(vec![write])?;
        Ok(versions.first().copied().unwrap_or_default())
    }

    /// Atomic multi-key write; see [`KeyValueStore::set_many`].
    pub fn store_many(&self, writes: Vec<BlobWrite>) -> Result<Vec<Version>> {
        self.store.set_many(writes)
    }

    /// `Ok(None)` when the key is absent or expired. Store failures and
    /// undecodable bytes are errors.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Loaded<T>>> {
        let Some(blob) = self.store.get(key)? else {
            return Ok(None);
        };
        let entry: Option<CacheEntry<T>> = codec::decode(key, &blob.bytes, Utc::now())?;
        Ok(entry.map(|entry| Loaded {
            value: entry.value,
            version: blob.version,
            written_at: entry.written_at,
        }))
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.store.delete(key)
    }

    /// Reads the four keys of a run once.
    pub fn load_state(&self, keys: &CacheKeys) -> Result<StateLoad> {
        let data: Option<Loaded<SimulationData>> = self.load(&keys.simulation_data())?;
        let internal: Option<Loaded<LookupMap>> =
            self.load(&keys.factor(FactorCategory::Internal))?;
        let external: Option<Loaded<LookupMap>> =
            self.load(&keys.factor(FactorCategory::External))?;
        let institutional: Option<Loaded<LookupMap>> =
            self.load(&keys.factor(FactorCategory::Institutional))?;

        let (Some(data), Some(internal), Some(external), Some(institutional)) =
            (&data, &internal, &external, &institutional)
        else {
            let present = [
                data.is_some(),
                internal.is_some(),
                external.is_some(),
                institutional.is_some(),
            ];
            let missing = keys
                .all()
                .into_iter()
                .zip(present)
                .filter_map(|(key, present)| (!present).then_some(key))
                .collect();
            return Ok(StateLoad::Missing(missing));
        };

        let versions = StateVersions {
            simulation_data: data.version,
            internal: internal.version,
            external: external.version,
            institutional: institutional.version,
        };
        let memory = MemoryState::from_parts(
            data.value.tick,
            data.value.roster.clone(),
            internal.value.clone(),
            external.value.clone(),
            institutional.value.clone(),
        )
        .map_err(|e| {
            StoreError::corrupt(keys.simulation_data(), e.to_string())
                .with_context(format!("rebuilding run {}", keys.run_id()))
        })?;

        Ok(StateLoad::Loaded(Box::new(CachedState {
            data: data.value.clone(),
            memory,
            versions,
        })))
    }

    /// Writes the four keys of a run in one atomic batch.
    ///
    /// With `expected` set, every key must still carry the version it was read
    /// at, otherwise the whole batch is rejected with a conflict. Without it
    /// the state is overwritten.
    pub fn store_state(
        &self,
        keys: &CacheKeys,
        data: &SimulationData,
        memory: &MemoryState,
        expected: Option<&StateVersions>,
    ) -> Result<StateVersions> {
        let expect = |i: usize| match expected {
            Some(v) => Expect::Version(v.as_array()[i]),
            None => Expect::Any,
        };
        let [data_key, internal_key, external_key, institutional_key] = keys.all();
        let writes = vec![
            self.prepare(&data_key, data, expect(0))?,
            self.prepare(&internal_key, memory.lookup(FactorCategory::Internal), expect(1))?,
            self.prepare(&external_key, memory.lookup(FactorCategory::External), expect(2))?,
            self.prepare(
                &institutional_key,
                memory.lookup(FactorCategory::Institutional),
                expect(3),
            )?,
        ];

        let versions = self.store.set_many(writes)?;
        match versions.as_slice() {
            [simulation_data, internal, external, institutional] => Ok(StateVersions {
                simulation_data: *simulation_data,
                internal: *internal,
                external: *external,
                institutional: *institutional,
            }),
            other => Err(StoreError::backend(format!(
                "store acknowledged {} of 4 writes",
                other.len()
            ))),
        }
    }
}
