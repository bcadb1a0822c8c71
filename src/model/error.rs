//! Error taxonomy of the service layer.

use scholarsim_core::EngineError;
use scholarsim_io::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid input or a failed computation inside the engine
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The cache or the relational source failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No usable memory state in the cache for this run
    #[error("Memory state for run {run_id} is not loaded (missing: {}); load memory first", missing.join(", "))]
    StateNotLoaded { run_id: String, missing: Vec<String> },

    /// Every retry of a step lost against a concurrent writer
    #[error("Step for run {run_id} gave up after {attempts} version conflicts")]
    Conflict { run_id: String, attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// HTTP-style status a front end would answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            SimError::Engine(EngineError::InvalidCategory(_) | EngineError::MalformedInput(_)) => {
                400
            }
            SimError::Engine(EngineError::NotFound(_)) => 404,
            SimError::Engine(EngineError::Computation { .. }) => 500,
            SimError::Store(err) if err.is_conflict() => 409,
            SimError::Store(_) => 500,
            SimError::StateNotLoaded { .. } => 503,
            SimError::Conflict { .. } => 409,
            SimError::Config(_) => 500,
        }
    }
}
