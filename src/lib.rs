//! # Scholarsim
//!
//! A stateless service over the simulation engine: each call reads the run's
//! memory state from the cache, works on it and writes it back under version
//! guards, so several processes can drive the same run.
//!
//! ```
//! use scholarsim_core::FixedSource;
//! use scholarsim_data::{InternalFactors, SimulationKey};
//! use scholarsim_io::{CacheGateway, CacheKeys, InMemorySource, MemoryStore};
//! use scholarsim_lib::SimulationService;
//! use std::sync::Arc;
//!
//! let mut source = InMemorySource::new();
//! source
//!     .add_simulation(1, [1])
//!     .add_record(InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0));
//!
//! let service = SimulationService::new(
//!     CacheGateway::new(Arc::new(MemoryStore::new())),
//!     CacheKeys::new("doc"),
//!     Default::default(),
//! );
//! service.load_memory(&source).unwrap();
//! let report = service.run_step_with(|_| FixedSource::midpoint()).unwrap();
//! assert_eq!(report.scores.len(), 1);
//! ```

pub mod model;

pub use model::config::{AppConfig, CacheBackend, CacheConfig, SourceConfig};
pub use model::error::{Result, SimError};
pub use model::service::{LoadSummary, SimulationService, StateSummary};
