//! Error types for scholarsim_core.
//!
//! Covers lookup construction, merging, perturbation and scoring. Store and
//! cache failures live in `scholarsim_io`.

use scholarsim_data::{FactorCategory, RecordId, UnknownCategory};
use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A category tag that names none of the three factor categories
    #[error("Invalid factor category: {0}")]
    InvalidCategory(String),

    /// Grouped input that cannot be indexed
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A rating that cannot be averaged or perturbed
    #[error("Computation error on {category} record {record_id}: {reason}")]
    Computation {
        category: FactorCategory,
        record_id: RecordId,
        reason: String,
    },

    /// Absent factor for a student/category
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    #[must_use]
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedInput(msg.into())
    }

    #[must_use]
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn computation<S: Into<String>>(
        category: FactorCategory,
        record_id: RecordId,
        reason: S,
    ) -> Self {
        Self::Computation {
            category,
            record_id,
            reason: reason.into(),
        }
    }
}

impl From<UnknownCategory> for EngineError {
    fn from(err: UnknownCategory) -> Self {
        Self::InvalidCategory(err.0)
    }
}
