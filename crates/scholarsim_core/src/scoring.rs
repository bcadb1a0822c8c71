//! Reduction of factor records to impacts and performance scores.

use crate::error::{EngineError, Result};
use crate::random::RandomSource;
use scholarsim_data::{FactorCategory, FactorRecord, RatingRange};
use serde::{Deserialize, Serialize};

/// Impact of a category with no record.
pub const NEUTRAL_BASELINE: f64 = 1.0;
pub const DEFAULT_BASE_SCORE: f64 = 70.0;
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 5.0;
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Relative weight of each category in the weighted impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub internal: f64,
    pub external: f64,
    pub institutional: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            internal: 0.4,
            external: 0.3,
            institutional: 0.3,
        }
    }
}

impl FactorWeights {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.internal + self.external + self.institutional
    }
}

/// The three per-category impacts of one student.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Impacts {
    pub internal: f64,
    pub external: f64,
    pub institutional: f64,
}

impl Default for Impacts {
    fn default() -> Self {
        Self {
            internal: NEUTRAL_BASELINE,
            external: NEUTRAL_BASELINE,
            institutional: NEUTRAL_BASELINE,
        }
    }
}

impl Impacts {
    pub fn set(&mut self, category: FactorCategory, value: f64) {
        match category {
            FactorCategory::Internal => self.internal = value,
            FactorCategory::External => self.external = value,
            FactorCategory::Institutional => self.institutional = value,
        }
    }
}

/// Holds the scoring constants of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringEngine {
    pub weights: FactorWeights,
    pub base_score: f64,
    pub noise_amplitude: f64,
    pub baseline: f64,
    pub range: RatingRange,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            base_score: DEFAULT_BASE_SCORE,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            baseline: NEUTRAL_BASELINE,
            range: RatingRange::CANONICAL,
        }
    }
}

impl ScoringEngine {
    /// Average rating of `record`, or the baseline when there is nothing to
    /// average. Fails on a rating outside the range.
    pub fn try_impact(&self, record: Option<&FactorRecord>) -> Result<f64> {
        let Some(record) = record else {
            return Ok(self.baseline);
        };
        let ratings = record.named_ratings();
        if ratings.is_empty() {
            return Ok(self.baseline);
        }
        let mut total = 0.0;
        for (field, value) in &ratings {
            if !self.range.contains(*value) {
                return Err(EngineError::computation(
                    record.category(),
                    record.id(),
                    format!("{field} = {value} cannot be averaged"),
                ));
            }
            total += value;
        }
        Ok(total / ratings.len() as f64)
    }

    /// Like [`ScoringEngine::try_impact`] but falls back to the baseline.
    #[must_use]
    pub fn impact(&self, record: Option<&FactorRecord>) -> f64 {
        self.try_impact(record).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Impact fell back to baseline");
            self.baseline
        })
    }

    #[must_use]
    pub fn weighted_impact(&self, impacts: &Impacts) -> f64 {
        impacts.external * self.weights.external
            + impacts.internal * self.weights.internal
            + impacts.institutional * self.weights.institutional
    }

    /// `clamp(base_score * weighted + noise, 0, 100)`.
    pub fn score<R: RandomSource + ?Sized>(&self, impacts: &Impacts, rng: &mut R) -> f64 {
        let noise = rng.uniform(-self.noise_amplitude, self.noise_amplitude);
        let raw = self.base_score * self.weighted_impact(impacts) + noise;
        if raw.is_nan() {
            return SCORE_MIN;
        }
        raw.clamp(SCORE_MIN, SCORE_MAX)
    }

    pub fn performance<R: RandomSource + ?Sized>(
        &self,
        internal: Option<&FactorRecord>,
        external: Option<&FactorRecord>,
        institutional: Option<&FactorRecord>,
        rng: &mut R,
    ) -> f64 {
        let impacts = Impacts {
            internal: self.impact(internal),
            external: self.impact(external),
            institutional: self.impact(institutional),
        };
        self.score(&impacts, rng)
    }
}

/// Impact with the default constants.
#[must_use]
pub fn impact(record: Option<&FactorRecord>) -> f64 {
    ScoringEngine::default().impact(record)
}

/// Performance with the default constants.
pub fn performance<R: RandomSource + ?Sized>(
    internal: Option<&FactorRecord>,
    external: Option<&FactorRecord>,
    institutional: Option<&FactorRecord>,
    rng: &mut R,
) -> f64 {
    ScoringEngine::default().performance(internal, external, institutional, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedSource;
    use scholarsim_data::{ExternalFactors, InstitutionalFactors, InternalFactors, SimulationKey};

    fn internal(value: f64) -> FactorRecord {
        InternalFactors::uniform(1, SimulationKey::new(1, 1), value).into()
    }

    #[test]
    fn test_impact_of_absent_record_is_baseline() {
        assert_eq!(impact(None), 1.0);
    }

    #[test]
    fn test_impact_is_mean_of_ratings() {
        let mut record = InternalFactors::uniform(1, SimulationKey::new(1, 1), 2.0);
        record.goal_setting = 9.0;
        // 8 * 2.0 + 9.0 = 25.0 over 9 ratings
        let record: FactorRecord = record.into();
        let value = impact(Some(&record));
        assert!((value - 25.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_rating_falls_back() {
        let engine = ScoringEngine::default();
        let bad = internal(12.0);
        assert!(engine.try_impact(Some(&bad)).is_err());
        assert_eq!(engine.impact(Some(&bad)), NEUTRAL_BASELINE);
    }

    #[test]
    fn test_performance_with_zero_noise() {
        let inst: FactorRecord = InstitutionalFactors::uniform(1, 1, 1, 0.7).into();
        let ext: FactorRecord = ExternalFactors::uniform(1, SimulationKey::new(1, 1), 0.5).into();
        let score = performance(
            Some(&internal(0.6)),
            Some(&ext),
            Some(&inst),
            &mut FixedSource::midpoint(),
        );
        assert!((score - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_missing_scores_base() {
        let score = performance(None, None, None, &mut FixedSource::midpoint());
        assert!((score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_clamped() {
        let engine = ScoringEngine::default();
        let high = Impacts {
            internal: 10.0,
            external: 10.0,
            institutional: 10.0,
        };
        assert_eq!(engine.score(&high, &mut FixedSource::high()), SCORE_MAX);

        let low = Impacts {
            internal: 0.0,
            external: 0.0,
            institutional: 0.0,
        };
        assert_eq!(engine.score(&low, &mut FixedSource::low()), SCORE_MIN);
    }

    #[test]
    fn test_nan_impact_scores_zero() {
        let engine = ScoringEngine::default();
        let impacts = Impacts {
            internal: f64::NAN,
            ..Impacts::default()
        };
        assert_eq!(engine.score(&impacts, &mut FixedSource::midpoint()), 0.0);
    }
}
