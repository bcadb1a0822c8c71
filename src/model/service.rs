//! The stateless request surface: every call reads the run state from the
//! cache, works on it, and writes it back.

use crate::model::config::{AppConfig, CacheBackend};
use crate::model::error::{Result, SimError};
use scholarsim_core::metrics::{DUPLICATE_KEY, STORE_CONFLICT};
use scholarsim_core::{
    tick_rng, EngineConfig, LookupMap, MemoryState, Metrics, Orchestrator, RandomSource,
    TickReport, TickRow,
};
use scholarsim_data::{FactorBatch, FactorCategory};
use scholarsim_io::{
    CacheGateway, CacheKeys, CachedState, FactorSource, KeyValueStore, MemoryStore,
    SimulationData, SqliteStore, StateLoad,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// What a full load put into the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub run_id: String,
    pub simulations: usize,
    pub students: usize,
    pub records: usize,
    pub entries: usize,
    pub collisions: usize,
}

/// Cached state of a run as shown by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub run_id: String,
    pub tick: u64,
    pub simulations: usize,
    pub students: usize,
    pub internal_entries: usize,
    pub external_entries: usize,
    pub institutional_entries: usize,
    pub collisions: usize,
    /// Whether the run was loaded with the engine parameters now configured.
    pub config_matches: bool,
}

pub struct SimulationService {
    gateway: CacheGateway,
    keys: CacheKeys,
    config: EngineConfig,
    orchestrator: Orchestrator,
    max_conflict_retries: u32,
    metrics: Arc<Metrics>,
}

impl SimulationService {
    #[must_use]
    pub fn new(gateway: CacheGateway, keys: CacheKeys, config: EngineConfig) -> Self {
        let orchestrator = Orchestrator::from_config(&config);
        Self {
            gateway,
            keys,
            config,
            orchestrator,
            max_conflict_retries: 3,
            metrics: Arc::new(Metrics::new()),
        }
    }

    #[must_use]
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Opens the configured cache backend.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SimError::Config(format!("{e:#}")))?;
        let store: Arc<dyn KeyValueStore> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::Sqlite => Arc::new(SqliteStore::open(
                &config.cache.path,
                config.cache.timeout(),
            )?),
        };
        let gateway = CacheGateway::new(store).with_ttl(config.cache.ttl());
        Ok(Self::new(
            gateway,
            CacheKeys::new(config.cache.run_id.clone()),
            config.engine.clone(),
        )
        .with_max_conflict_retries(config.cache.max_conflict_retries))
    }

    #[must_use]
    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Rebuilds the run state from `source` and overwrites the cache with it.
    pub fn load_memory(&self, source: &dyn FactorSource) -> Result<LoadSummary> {
        let builder = self.config.lookup_builder();
        let mut memory = MemoryState::default();
        let mut batch = FactorBatch::new();

        for simulation_id in source.simulations()? {
            let loaded = source.load_simulation(simulation_id)?;
            let state = MemoryState::create_with(&builder, &loaded)?;
            memory = MemoryState::merge(memory, state);
            batch.merge(loaded);
        }

        let data = SimulationData {
            tick: memory.tick,
            roster: memory.roster.clone(),
            config_fingerprint: self.config.fingerprint(),
            batch,
        };
        self.gateway.store_state(&self.keys, &data, &memory, None)?;

        let summary = LoadSummary {
            run_id: self.keys.run_id().to_string(),
            simulations: memory.roster.simulation_count(),
            students: memory.roster.student_count(),
            records: data.batch.record_count(),
            entries: memory.entry_count(),
            collisions: memory.collisions(),
        };
        self.metrics
            .add_to_counter(DUPLICATE_KEY, summary.collisions as u64);
        tracing::info!(
            run = %summary.run_id,
            simulations = summary.simulations,
            students = summary.students,
            entries = summary.entries,
            collisions = summary.collisions,
            "Memory loaded"
        );
        Ok(summary)
    }

    fn load_cached(&self) -> Result<CachedState> {
        match self.gateway.load_state(&self.keys)? {
            StateLoad::Loaded(cached) => Ok(*cached),
            StateLoad::Missing(missing) => Err(SimError::StateNotLoaded {
                run_id: self.keys.run_id().to_string(),
                missing,
            }),
        }
    }

    /// Runs one tick with the configured randomness.
    pub fn run_step(&self) -> Result<TickReport> {
        let seed = self.config.effective_seed();
        self.run_step_with(|tick| tick_rng(seed, tick))
    }

    /// Runs one tick, drawing randomness from `rng_for(tick)`.
    ///
    /// The state is read once and written back once, guarded by the versions
    /// it was read at. A lost race restarts the whole step from a fresh read.
    pub fn run_step_with<R, F>(&self, mut rng_for: F) -> Result<TickReport>
    where
        R: RandomSource,
        F: FnMut(u64) -> R,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let started = Instant::now();
            let CachedState {
                mut data,
                mut memory,
                versions,
            } = self.load_cached()?;

            if data.config_fingerprint != self.config.fingerprint() {
                tracing::warn!(
                    run = %self.keys.run_id(),
                    "Engine parameters changed since the run was loaded"
                );
            }

            let mut rng = rng_for(memory.tick + 1);
            let report = self.orchestrator.run_tick(&mut memory, &mut rng);
            data.tick = memory.tick;
            data.roster = memory.roster.clone();

            match self
                .gateway
                .store_state(&self.keys, &data, &memory, Some(&versions))
            {
                Ok(_) => {
                    self.metrics.record_tick(started.elapsed(), &report);
                    return Ok(report);
                }
                Err(err) if err.is_conflict() => {
                    self.metrics.increment_counter(STORE_CONFLICT);
                    tracing::warn!(
                        run = %self.keys.run_id(),
                        attempt = attempts,
                        error = %err,
                        "Concurrent step detected"
                    );
                    if attempts > self.max_conflict_retries {
                        return Err(SimError::Conflict {
                            run_id: self.keys.run_id().to_string(),
                            attempts,
                        });
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// One step flattened to rows: scores, then aggregates, then failures.
    pub fn process_simulation(&self) -> Result<Vec<TickRow>> {
        Ok(self.run_step()?.rows())
    }

    /// The cached lookup of one category, selected by tag.
    pub fn build_lookup(&self, tag: &str) -> Result<LookupMap> {
        let cached = self.load_cached()?;
        Ok(cached.memory.lookup_by_tag(tag)?.clone())
    }

    pub fn inspect(&self) -> Result<StateSummary> {
        let CachedState { data, memory, .. } = self.load_cached()?;
        Ok(StateSummary {
            run_id: self.keys.run_id().to_string(),
            tick: memory.tick,
            simulations: memory.roster.simulation_count(),
            students: memory.roster.student_count(),
            internal_entries: memory.lookup(FactorCategory::Internal).len(),
            external_entries: memory.lookup(FactorCategory::External).len(),
            institutional_entries: memory.lookup(FactorCategory::Institutional).len(),
            collisions: memory.collisions(),
            config_matches: data.config_fingerprint == self.config.fingerprint(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarsim_core::FixedSource;
    use scholarsim_data::{InternalFactors, SimulationKey};
    use scholarsim_io::InMemorySource;

    fn service() -> SimulationService {
        SimulationService::new(
            CacheGateway::new(Arc::new(MemoryStore::new())),
            CacheKeys::new("unit"),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_step_before_load_is_state_not_loaded() {
        let err = service().run_step().unwrap_err();
        assert!(matches!(err, SimError::StateNotLoaded { .. }));
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_load_then_step_advances_tick() {
        let mut source = InMemorySource::new();
        source
            .add_simulation(1, [1])
            .add_record(InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0));
        let service = service();
        let summary = service.load_memory(&source).unwrap();
        assert_eq!(summary.entries, 1);

        service.run_step_with(|_| FixedSource::midpoint()).unwrap();
        let report = service.run_step_with(|_| FixedSource::midpoint()).unwrap();
        assert_eq!(report.tick, 2);
        assert_eq!(service.inspect().unwrap().tick, 2);
        assert_eq!(service.metrics().tick_count(), 2);
    }

    #[test]
    fn test_build_lookup_rejects_unknown_tag() {
        let service = service();
        service.load_memory(&InMemorySource::new()).unwrap();
        let err = service.build_lookup("mem_social_factor").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
