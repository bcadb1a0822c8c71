use serde::{Deserialize, Serialize};

/// Closed interval every factor rating must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRange {
    pub min: f64,
    pub max: f64,
}

impl RatingRange {
    /// The single valid rating domain, enforced at ingestion and after every
    /// perturbation.
    ///
    /// Scores are `70 * weighted_impact` clamped to 100, so on this scale any
    /// weighted impact above about 1.43 saturates at the ceiling. Only ratings
    /// near the bottom of the range produce scores below 100.
    pub const CANONICAL: RatingRange = RatingRange {
        min: 0.0,
        max: 10.0,
    };

    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamps a finite value into the range. NaN maps to `min`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

impl Default for RatingRange {
    fn default() -> Self {
        Self::CANONICAL
    }
}
