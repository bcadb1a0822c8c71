//! Random-walk drift applied to factor ratings between ticks.

use crate::error::{EngineError, Result};
use crate::random::RandomSource;
use scholarsim_data::{FactorRecord, RatingRange};

pub const DEFAULT_STEP_SIZE: f64 = 0.1;

/// Bounded random walk over every rating of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomWalk {
    pub step_size: f64,
    pub range: RatingRange,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            range: RatingRange::CANONICAL,
        }
    }
}

impl RandomWalk {
    #[must_use]
    pub fn new(step_size: f64, range: RatingRange) -> Self {
        Self { step_size, range }
    }

    /// Adds an independent `uniform(-step, step)` delta to each rating and
    /// clamps it back into the range.
    ///
    /// The record is validated before any rating moves, so an error leaves it
    /// exactly as it was.
    pub fn perturb<R: RandomSource + ?Sized>(
        &self,
        record: &mut FactorRecord,
        rng: &mut R,
    ) -> Result<()> {
        if !self.step_size.is_finite() || self.step_size < 0.0 {
            return Err(EngineError::computation(
                record.category(),
                record.id(),
                format!("invalid step size {}", self.step_size),
            ));
        }
        if let Some((field, value)) = record
            .named_ratings()
            .into_iter()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(EngineError::computation(
                record.category(),
                record.id(),
                format!("{field} is {value}"),
            ));
        }

        let step = self.step_size;
        for rating in record.ratings_mut() {
            let delta = rng.uniform(-step, step);
            *rating = self.range.clamp(*rating + delta);
        }
        Ok(())
    }
}

/// Perturbs `record` with the canonical range.
pub fn perturb<R: RandomSource + ?Sized>(
    record: &mut FactorRecord,
    step_size: f64,
    rng: &mut R,
) -> Result<()> {
    RandomWalk::new(step_size, RatingRange::CANONICAL).perturb(record, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedSource;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use scholarsim_data::{ExternalFactors, InternalFactors, SimulationKey};

    #[test]
    fn test_high_draw_adds_full_step() {
        let mut record: FactorRecord =
            InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0).into();
        perturb(&mut record, 0.1, &mut FixedSource::high()).unwrap();
        assert!(record.ratings().iter().all(|v| (*v - 5.1).abs() < 1e-12));
    }

    #[test]
    fn test_clamps_at_range_edges() {
        let mut top: FactorRecord =
            InternalFactors::uniform(1, SimulationKey::new(1, 1), 10.0).into();
        perturb(&mut top, 0.5, &mut FixedSource::high()).unwrap();
        assert!(top.ratings().iter().all(|v| *v == 10.0));

        let mut bottom: FactorRecord =
            InternalFactors::uniform(1, SimulationKey::new(1, 1), 0.0).into();
        perturb(&mut bottom, 0.5, &mut FixedSource::low()).unwrap();
        assert!(bottom.ratings().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_identifiers_untouched() {
        let mut record: FactorRecord =
            ExternalFactors::uniform(42, SimulationKey::new(7, 9), 5.0).into();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            perturb(&mut record, 0.1, &mut rng).unwrap();
        }
        assert_eq!(record.id(), 42);
        assert_eq!(record.simulation_id(), 7);
        assert_eq!(record.student_id(), Some(9));
    }

    #[test]
    fn test_non_finite_rating_leaves_record_unchanged() {
        let mut inner = InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0);
        inner.focus_study = f64::NAN;
        let mut record: FactorRecord = inner.into();
        let before = record.ratings();

        let err = perturb(&mut record, 0.1, &mut FixedSource::high()).unwrap_err();
        assert!(matches!(err, EngineError::Computation { .. }));
        assert!(err.to_string().contains("focus_study"));
        let after = record.ratings();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_negative_step_is_rejected() {
        let mut record: FactorRecord =
            InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0).into();
        assert!(perturb(&mut record, -0.1, &mut FixedSource::high()).is_err());
        assert!(record.ratings().iter().all(|v| *v == 5.0));
    }

    #[test]
    fn test_zero_step_is_identity() {
        let mut record: FactorRecord =
            InternalFactors::uniform(1, SimulationKey::new(1, 1), 5.0).into();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        perturb(&mut record, 0.0, &mut rng).unwrap();
        assert!(record.ratings().iter().all(|v| *v == 5.0));
    }
}
