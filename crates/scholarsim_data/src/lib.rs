//! # Scholarsim Data
//!
//! Plain data shared by the engine and the persistence layer: factor records,
//! their static rating schema, simulation keys and grouped load batches.

pub mod data;

pub use data::batch::{FactorBatch, FactorGroup, GroupKey, GroupedFactors, Roster};
pub use data::factor::{
    ExternalFactors, FactorCategory, FactorRecord, FactorSchema, InstitutionalFactors,
    InternalFactors, UnknownCategory,
};
pub use data::key::{RecordId, SimulationId, SimulationKey, StudentId, UniversityId};
pub use data::range::RatingRange;
