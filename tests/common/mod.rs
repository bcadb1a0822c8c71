use scholarsim_core::EngineConfig;
use scholarsim_data::{ExternalFactors, InstitutionalFactors, InternalFactors, SimulationKey};
use scholarsim_io::{CacheGateway, CacheKeys, InMemorySource, KeyValueStore, MemoryStore};
use scholarsim_lib::SimulationService;
use std::sync::Arc;

/// Simulation 1 at university 5: students 1 and 2 with internal ratings 0.6
/// and 0.8, external 0.5 each, and one institutional record at 0.7.
#[allow(dead_code)]
pub fn two_student_source() -> InMemorySource {
    let mut source = InMemorySource::new();
    source
        .add_simulation(1, [1, 2])
        .add_record(InternalFactors::uniform(11, SimulationKey::new(1, 1), 0.6))
        .add_record(InternalFactors::uniform(12, SimulationKey::new(1, 2), 0.8))
        .add_record(ExternalFactors::uniform(21, SimulationKey::new(1, 1), 0.5))
        .add_record(ExternalFactors::uniform(22, SimulationKey::new(1, 2), 0.5))
        .add_record(InstitutionalFactors::uniform(31, 1, 5, 0.7));
    source
}

/// Three simulations with mid-range ratings, the last one without students.
/// Every scored student here saturates at 100.
#[allow(dead_code)]
pub fn cohort_source() -> InMemorySource {
    let mut source = InMemorySource::new();
    source
        .add_simulation(1, [1, 2, 3])
        .add_simulation(2, [4, 5])
        .add_simulation(3, []);
    let mut id = 100;
    for (simulation_id, student_id) in [(1, 1), (1, 2), (1, 3), (2, 4), (2, 5)] {
        let key = SimulationKey::new(simulation_id, student_id);
        let value = 3.0 + student_id as f64;
        source
            .add_record(InternalFactors::uniform(id, key, value))
            .add_record(ExternalFactors::uniform(id + 1, key, 10.0 - value));
        id += 2;
    }
    source
        .add_record(InstitutionalFactors::uniform(900, 1, 5, 6.0))
        .add_record(InstitutionalFactors::uniform(901, 2, 6, 4.0));
    source
}

#[allow(dead_code)]
pub fn seeded_config(seed: u64) -> EngineConfig {
    EngineConfig {
        seed: Some(seed),
        deterministic: true,
        ..EngineConfig::default()
    }
}

#[allow(dead_code)]
pub fn service_with(
    store: Arc<dyn KeyValueStore>,
    run_id: &str,
    config: EngineConfig,
) -> SimulationService {
    SimulationService::new(CacheGateway::new(store), CacheKeys::new(run_id), config)
}

#[allow(dead_code)]
pub fn memory_service(run_id: &str) -> SimulationService {
    service_with(Arc::new(MemoryStore::new()), run_id, EngineConfig::default())
}

#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
