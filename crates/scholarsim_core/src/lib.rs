//! # Scholarsim Core
//!
//! The deterministic engine behind Scholarsim, a tick-based simulation of how
//! internal, external and institutional factors shape student performance.
//!
//! This crate contains:
//! - Lookup construction from grouped relational records
//! - The owned memory state and its last-write-wins merge
//! - Bounded random-walk perturbation of factor ratings
//! - Impact and performance scoring
//! - The per-tick orchestrator producing scores and simulation aggregates
//! - Engine configuration, metrics and structured logging
//!
//! Everything here is synchronous and free of I/O; persistence of the memory
//! state lives in `scholarsim_io`.
//!
//! ## Example
//!
//! ```
//! use scholarsim_core::{FixedSource, MemoryState, Orchestrator};
//! use scholarsim_data::{FactorBatch, GroupKey, InternalFactors, SimulationKey};
//!
//! let mut batch = FactorBatch::new();
//! batch.internal.insert(
//!     GroupKey::new(1, vec![7]),
//!     [InternalFactors::uniform(1, SimulationKey::new(1, 7), 5.0).into()],
//! );
//!
//! let mut state = MemoryState::create(&batch).unwrap();
//! let report = Orchestrator::default().run_tick(&mut state, &mut FixedSource::midpoint());
//! assert_eq!(report.scores.len(), 1);
//! assert_eq!(report.aggregates.len(), 1);
//! ```

/// Engine parameters and their validation
pub mod config;
/// Engine error taxonomy
pub mod error;
/// Flattening of grouped records into keyed lookups
pub mod lookup;
/// Owned memory state and merge policy
pub mod memory;
/// Run counters and logging setup
pub mod metrics;
/// Per-tick orchestration and report rows
pub mod orchestrator;
/// Bounded random walk over factor ratings
pub mod perturbation;
/// Injectable randomness
pub mod random;
/// Impact and performance scoring
pub mod scoring;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use lookup::{build_lookup, build_lookup_tagged, LookupBuilder, LookupMap};
pub use memory::MemoryState;
pub use metrics::{init_logging, Metrics};
pub use orchestrator::{
    Orchestrator, SimulationAggregate, StudentFailure, StudentScore, TickReport, TickRow,
    TickWarning, WarningKind,
};
pub use perturbation::{perturb, RandomWalk, DEFAULT_STEP_SIZE};
pub use random::{tick_rng, FixedSource, RandomSource};
pub use scoring::{impact, performance, FactorWeights, Impacts, ScoringEngine, NEUTRAL_BASELINE};
